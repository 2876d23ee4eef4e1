//! Ollama Generator
//!
//! Upstream generator for an Ollama server.
//!
//! # Ollama API
//!
//! Uses `/api/chat` with `"stream": true`. The reply is newline-delimited
//! JSON; each line carries `message.content` (possibly empty) and a `done`
//! flag, or an `error` field when generation fails mid-way.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::traits::{BackendError, Generator, TextStream};
use crate::session::ChatMessage;

/// Settings for [`OllamaGenerator`]
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Model name; empty means not configured
    pub model: String,
    /// Persona prompt sent as the first message
    pub system_prompt: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            model: crate::config::file::DEFAULT_MODEL.to_string(),
            system_prompt: crate::config::file::DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl OllamaConfig {
    /// Take the generator settings out of a resolved daemon configuration
    pub fn from_server_config(config: &crate::config::ServerConfigFile) -> Self {
        Self {
            host: config.ollama_host.clone(),
            port: config.ollama_port,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            timeout: config.request_timeout,
        }
    }
}

/// One NDJSON line of a streaming chat reply
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Ollama generator client
#[derive(Clone)]
pub struct OllamaGenerator {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OllamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerator")
            .field("base_url", &self.base_url())
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl OllamaGenerator {
    /// Create a new Ollama generator
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.config.host, self.config.port)
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    /// Build the request body: system prompt first, then the history
    fn build_request(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !self.config.system_prompt.is_empty() {
            wire.push(serde_json::json!({
                "role": "system",
                "content": self.config.system_prompt,
            }));
        }
        wire.extend(messages.iter().map(|m| {
            serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })
        }));

        serde_json::json!({
            "model": self.config.model,
            "messages": wire,
            "stream": true,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn check_configured(&self) -> Result<(), BackendError> {
        if self.config.model.trim().is_empty() {
            return Err(BackendError::NotConfigured(
                "Model not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<TextStream, BackendError> {
        self.check_configured()?;

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&self.build_request(messages))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            return Err(BackendError::Api {
                status,
                message: format!("Ollama returned {status}: {message}"),
            });
        }

        let (tx, mut rx) = mpsc::channel(100);
        let mut stream = response.bytes_stream();

        // Spawn task to process stream
        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);

                        // Parse newline-delimited JSON
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            match parse_line(&line) {
                                LineOutcome::Skip => {}
                                LineOutcome::Text(text) => {
                                    if tx.send(Ok(text)).await.is_err() {
                                        // Receiver dropped, stop streaming
                                        return;
                                    }
                                }
                                LineOutcome::Done => return,
                                LineOutcome::Failed(error) => {
                                    let _ = tx.send(Err(BackendError::Stream(error))).await;
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(BackendError::Http(e))).await;
                        return;
                    }
                }
            }

            // Final line without a trailing newline
            match parse_line(&buffer) {
                LineOutcome::Text(text) => {
                    let _ = tx.send(Ok(text)).await;
                }
                LineOutcome::Failed(error) => {
                    let _ = tx.send(Err(BackendError::Stream(error))).await;
                }
                LineOutcome::Skip | LineOutcome::Done => {}
            }
        });

        Ok(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed())
    }
}

enum LineOutcome {
    Skip,
    Text(String),
    Done,
    Failed(String),
}

fn parse_line(line: &[u8]) -> LineOutcome {
    if line.iter().all(u8::is_ascii_whitespace) {
        return LineOutcome::Skip;
    }
    let chunk: ChatChunk = match serde_json::from_slice(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable Ollama line");
            return LineOutcome::Skip;
        }
    };
    if let Some(error) = chunk.error {
        return LineOutcome::Failed(error);
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done {
        // Ollama sends an empty message with the final line
        return if text.is_empty() {
            LineOutcome::Done
        } else {
            LineOutcome::Text(text)
        };
    }
    if text.is_empty() {
        LineOutcome::Skip
    } else {
        LineOutcome::Text(text)
    }
}
