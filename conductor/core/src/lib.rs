//! Retroterm Core - Headless Streaming Presentation Engine
//!
//! This crate turns an incrementally-arriving reply from a chat endpoint into
//! a human-paced, character-by-character reveal, with an avatar that "talks"
//! and a retro beep while text is being typed. It is completely independent
//! of any UI framework: a surface implements a handful of traits and the
//! engine drives it.
//!
//! # Architecture
//!
//! ```text
//!   network bytes
//!        │
//!        ▼
//! ┌──────────────────┐   Frame    ┌────────────────┐  RenderUnit  ┌──────────────┐
//! │ StreamFrame      │──────────► │ Typewriter     │────────────► │ RenderSink   │
//! │ Decoder          │            │ Queue          │   (cadence)  │ (surface)    │
//! └──────────────────┘            └───────┬────────┘              └──────┬───────┘
//!                                         │ speaking?                    │ append
//!                                         ▼                              ▼
//!                                 ┌────────────────┐            ┌─────────────────┐
//!                                 │ SideEffect     │            │ AutoScroll      │
//!                                 │ Scheduler      │            │ Controller      │
//!                                 └────────────────┘            └─────────────────┘
//!
//!              TurnSession owns the loop, the busy flag and the history
//! ```
//!
//! Data flows one way. [`TurnSession`] is the only writer of shared state.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use retroterm_core::{EngineConfig, HttpChatBackend, TurnSession};
//!
//! let backend = HttpChatBackend::new("http://127.0.0.1:8787")?;
//! let ui = backend.fetch_config().await?.ui;
//! let config = EngineConfig::from_ui(&ui)?;
//!
//! let surface = Arc::new(Mutex::new(MySurface::default()));
//! let session = TurnSession::builder(Arc::new(backend), surface)
//!     .config(config)
//!     .user_tag(ui.user_tag())
//!     .build();
//!
//! tokio::spawn({
//!     let session = session.clone();
//!     async move { session.submit("hi").await }
//! });
//! ```
//!
//! # Module Overview
//!
//! - [`stream`]: Wire frames and the incremental frame decoder
//! - [`typewriter`]: Rate-decoupling FIFO and tick cadence
//! - [`effects`]: Mouth animation and beep scheduling
//! - [`scroll`]: Bottom-anchored auto-scroll
//! - [`render`]: The surface-facing render trait and startup notices
//! - [`turn`]: The orchestrator
//! - [`session`]: Turns and conversation history
//! - [`config`]: UI document, engine settings, daemon file config
//! - [`backend`]: Chat endpoint client and upstream generator
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod effects;
pub mod render;
pub mod scroll;
pub mod session;
pub mod stream;
pub mod turn;
pub mod typewriter;

pub use backend::{
    BackendError, ByteStream, ChatBackend, Generator, HttpChatBackend, OllamaConfig,
    OllamaGenerator, TextStream,
};
pub use config::{
    Accents, ConfigDocument, ConfigError, ConfigOverrides, ConfigSource, EngineConfig, Rgb,
    ServerConfigFile, UiConfig,
};
pub use effects::{AudioSink, AvatarSink, BeepCue, MouthState, SideEffectScheduler, SilentAudio};
pub use render::{LineKind, MarkdownRenderer, RenderSink};
pub use scroll::{AutoScrollController, Viewport, ANCHOR_THRESHOLD};
pub use session::{ChatMessage, ChatRequest, ChatSession, Role, Turn, TurnId, TurnStatus};
pub use stream::{DecoderStats, Frame, FrameStream, StreamFrameDecoder};
pub use turn::{EngineStats, SubmitOutcome, Surface, TurnSession, TurnSessionBuilder, TurnState};
pub use typewriter::{Cadence, OverflowPolicy, RenderUnit, TypewriterQueue};
