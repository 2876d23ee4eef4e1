//! Pre-stream API errors
//!
//! Anything that goes wrong before the first frame is written can still pick
//! a status code, so it is answered with a plain `{"error": "..."}` body.
//! Failures after that point travel in-band as error frames instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use retroterm_core::BackendError;

/// Reported when the generator fails without saying why
pub const GENERATION_FAILED: &str = "Failed to generate response";

/// Rejection of a chat or config request before streaming started
#[derive(Debug, Error)]
pub enum ChatRequestError {
    /// Anything other than the route's method
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Body missing, not JSON, or without a non-empty `messages` array
    #[error("messages required")]
    MessagesRequired,

    /// The generator cannot serve requests as configured
    #[error("{0}")]
    NotConfigured(String),

    /// The generator failed before producing output
    #[error("{0}")]
    Upstream(String),
}

impl ChatRequestError {
    /// Status code of the error response
    pub fn status(&self) -> StatusCode {
        match self {
            ChatRequestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ChatRequestError::MessagesRequired => StatusCode::BAD_REQUEST,
            ChatRequestError::NotConfigured(_) | ChatRequestError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<BackendError> for ChatRequestError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotConfigured(reason) => ChatRequestError::NotConfigured(reason),
            other => {
                let message = other.to_string();
                if message.is_empty() {
                    ChatRequestError::Upstream(GENERATION_FAILED.to_string())
                } else {
                    ChatRequestError::Upstream(message)
                }
            }
        }
    }
}

impl IntoResponse for ChatRequestError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
