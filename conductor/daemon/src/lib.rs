//! Retroterm Daemon
//!
//! HTTP server in front of an upstream text generator. It serves the
//! streaming chat endpoint that [`retroterm_core::TurnSession`] consumes and
//! the UI configuration document surfaces fetch at startup.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use retroterm_daemon::{serve, AppState};
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8787").await?;
//! let state = AppState::new(Arc::new(generator), ui);
//! serve(listener, state, shutdown_signal()).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod server;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

pub use error::{ChatRequestError, GENERATION_FAILED};
pub use server::{router, AppState};

/// Serve requests on `listener` until `shutdown` resolves
///
/// In-flight responses are allowed to finish after `shutdown` fires.
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
