//! HTTP Routes
//!
//! Two endpoints:
//!
//! ```text
//!   POST /api/chat    {"messages":[...]}  ──►  text/event-stream of frames
//!   GET  /api/config                      ──►  {"ui": {...}}
//! ```
//!
//! The chat handler opens the generator and waits for its first item before
//! committing to a streaming response. Until then every failure can still be
//! answered with a status code; afterwards it can only be reported in-band.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use retroterm_core::stream::Frame;
use retroterm_core::{
    BackendError, ChatMessage, ChatRequest, ConfigDocument, Generator, TextStream, UiConfig,
};

use crate::error::{ChatRequestError, GENERATION_FAILED};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    generator: Arc<dyn Generator>,
    ui: Arc<UiConfig>,
}

impl AppState {
    /// Create the state from a generator and the UI document to publish
    pub fn new(generator: Arc<dyn Generator>, ui: UiConfig) -> Self {
        Self {
            generator,
            ui: Arc::new(ui),
        }
    }

    /// The published UI document
    pub fn ui(&self) -> &UiConfig {
        &self.ui
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

/// Build the daemon's router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat).fallback(method_not_allowed))
        .route("/api/config", get(config).fallback(method_not_allowed))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn method_not_allowed() -> ChatRequestError {
    ChatRequestError::MethodNotAllowed
}

async fn config(State(state): State<AppState>) -> Json<ConfigDocument> {
    Json(ConfigDocument {
        ui: state.ui().clone(),
    })
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ChatRequestError> {
    let messages = parse_messages(&body)?;
    let generator = &state.generator;

    info!(
        generator = generator.name(),
        messages = messages.len(),
        "Chat request"
    );

    generator.check_configured().map_err(|e| {
        warn!(error = %e, "Generator not configured");
        ChatRequestError::from(e)
    })?;

    let mut upstream = generator.generate(&messages).await.map_err(|e| {
        warn!(error = %e, "Generator failed to start");
        ChatRequestError::from(e)
    })?;

    // Hold the headers back until the generator has proven it can produce
    let first = match upstream.next().await {
        Some(Err(e)) => {
            warn!(error = %e, "Generator failed before first fragment");
            return Err(e.into());
        }
        first => first,
    };

    debug!("Streaming reply");
    Ok(Sse::new(frame_events(first, upstream)).into_response())
}

/// Decode a request body into a non-empty history
fn parse_messages(body: &[u8]) -> Result<Vec<ChatMessage>, ChatRequestError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejecting chat body");
        ChatRequestError::MessagesRequired
    })?;

    if request.messages.is_empty() {
        return Err(ChatRequestError::MessagesRequired);
    }
    Ok(request.messages)
}

// ============================================================================
// Frame Stream
// ============================================================================

/// Upstream fragments as wire frames
///
/// Empty fragments are skipped. The stream ends with `[DONE]` on success or
/// with a single error frame on failure, never both.
fn frame_events(
    first: Option<Result<String, BackendError>>,
    rest: TextStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let upstream: BoxStream<'static, Result<String, BackendError>> =
        stream::iter(first).chain(rest).boxed();

    stream::unfold(Some(upstream), |upstream| async move {
        let mut upstream = upstream?;
        loop {
            match upstream.next().await {
                Some(Ok(text)) if text.is_empty() => {}
                Some(Ok(text)) => return Some((Frame::Text(text), Some(upstream))),
                Some(Err(e)) => {
                    warn!(error = %e, "Generator failed mid-stream");
                    return Some((Frame::Error(in_band_message(&e)), None));
                }
                None => return Some((Frame::Done, None)),
            }
        }
    })
    .map(|frame| Ok(Event::default().data(frame.payload())))
}

fn in_band_message(err: &BackendError) -> String {
    let message = err.to_string();
    if message.is_empty() {
        GENERATION_FAILED.to_string()
    } else {
        message
    }
}
