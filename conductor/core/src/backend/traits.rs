//! Backend Traits
//!
//! Two seams, one on each side of the chat endpoint:
//!
//! - [`ChatBackend`]: what a surface's engine talks to. It posts the full
//!   history and hands back the raw response body as bytes, leaving frame
//!   decoding to [`FrameStream`](crate::stream::FrameStream).
//! - [`Generator`]: what the daemon talks to. It turns a history into a stream
//!   of text fragments from a language model.
//!
//! Both report failures before any output as `Err` from the opening call, so
//! callers can still answer with a status code.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::session::ChatMessage;

/// Errors from the chat endpoint or the upstream generator
#[derive(Debug, Error)]
pub enum BackendError {
    /// Required setting is missing
    #[error("{0}")]
    NotConfigured(String),

    /// Transport failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with a structured error body
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the `error` field, may be empty
        message: String,
    },

    /// Failure reported after output started
    #[error("{0}")]
    Stream(String),

    /// Response that could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Message shown to the user for a failed request
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Api { message, .. } if message.is_empty() => {
                "Request failed".to_string()
            }
            other => other.to_string(),
        }
    }

    /// HTTP status this error maps to, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Raw response body of the chat endpoint
pub type ByteStream = BoxStream<'static, Result<Bytes, BackendError>>;

/// Text fragments produced by a generator
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

/// Client side of the streaming chat endpoint
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Post the history and return the response body once headers arrive
    async fn open(&self, messages: &[ChatMessage]) -> Result<ByteStream, BackendError>;
}

/// Upstream text generator behind the chat endpoint
#[async_trait]
pub trait Generator: Send + Sync {
    /// Name for logs
    fn name(&self) -> &'static str;

    /// Whether the generator can serve requests; `Err` carries the reason
    fn check_configured(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Start generating a reply to `messages`
    async fn generate(&self, messages: &[ChatMessage]) -> Result<TextStream, BackendError>;
}
