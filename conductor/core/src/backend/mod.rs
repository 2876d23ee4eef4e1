//! Backend Integration
//!
//! Network access on both sides of the chat endpoint.
//!
//! # Available Backends
//!
//! - [`HttpChatBackend`]: surface-side client for a retroterm daemon
//! - [`OllamaGenerator`]: daemon-side generator for a local Ollama server
//!
//! # Usage
//!
//! ```ignore
//! use retroterm_core::backend::{ChatBackend, HttpChatBackend};
//!
//! let backend = HttpChatBackend::new("http://127.0.0.1:8787")?;
//! let ui = backend.fetch_config().await?.ui;
//! let body = backend.open(&history).await?;
//! ```

mod http;
mod ollama;
mod traits;

pub use http::HttpChatBackend;
pub use ollama::{OllamaConfig, OllamaGenerator};
pub use traits::{BackendError, ByteStream, ChatBackend, Generator, TextStream};
