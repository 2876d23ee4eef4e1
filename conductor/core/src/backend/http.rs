//! HTTP client for the retroterm daemon

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use super::traits::{BackendError, ByteStream, ChatBackend};
use crate::config::ConfigDocument;
use crate::session::{ChatMessage, ChatRequest};
use crate::stream::FramePayload;

/// Talks to `POST /api/chat` and `GET /api/config` on a daemon
#[derive(Clone, Debug)]
pub struct HttpChatBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpChatBackend {
    /// Create a client for the daemon at `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        // No overall timeout: a reply streams for as long as the model talks
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Daemon base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn config_url(&self) -> String {
        format!("{}/api/config", self.base_url)
    }

    /// Fetch the configuration document
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a body
    /// that is not a configuration document.
    pub async fn fetch_config(&self) -> Result<ConfigDocument, BackendError> {
        let response = self
            .http_client
            .get(self.config_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn open(&self, messages: &[ChatMessage]) -> Result<ByteStream, BackendError> {
        let request = ChatRequest {
            messages: messages.to_vec(),
        };

        tracing::debug!(
            url = %self.chat_url(),
            messages = messages.len(),
            "Opening chat stream"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.bytes_stream().map_err(BackendError::from).boxed())
    }
}

/// Read `{"error": "..."}` from a failed response
async fn api_error(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<FramePayload>(&body)
        .ok()
        .and_then(|payload| payload.error)
        .unwrap_or_default();
    tracing::warn!(status, message = %message, "Chat endpoint returned an error");
    BackendError::Api { status, message }
}
