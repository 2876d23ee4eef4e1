//! Endpoint Tests
//!
//! Runs the router on an ephemeral port with a scripted generator and talks
//! to it over real HTTP, both raw and through the engine's own client.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use retroterm_core::backend::{BackendError, ChatBackend, Generator, HttpChatBackend, TextStream};
use retroterm_core::stream::{Frame, FrameStream};
use retroterm_core::{ChatMessage, Role, UiConfig};
use retroterm_daemon::{serve, AppState};

// ============================================================================
// Test Doubles
// ============================================================================

#[derive(Default)]
struct ScriptedGenerator {
    not_configured: Option<String>,
    start_error: Option<String>,
    fragments: Vec<Result<&'static str, &'static str>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    fn replying(fragments: Vec<Result<&'static str, &'static str>>) -> Self {
        Self {
            fragments,
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn check_configured(&self) -> Result<(), BackendError> {
        match &self.not_configured {
            Some(reason) => Err(BackendError::NotConfigured(reason.clone())),
            None => Ok(()),
        }
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<TextStream, BackendError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(message) = &self.start_error {
            return Err(BackendError::Api {
                status: 503,
                message: message.clone(),
            });
        }
        let items: Vec<Result<String, BackendError>> = self
            .fragments
            .iter()
            .map(|item| match item {
                Ok(text) => Ok((*text).to_string()),
                Err(message) => Err(BackendError::Stream((*message).to_string())),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

async fn spawn_server(generator: Arc<ScriptedGenerator>) -> String {
    spawn_server_with_ui(generator, UiConfig::default()).await
}

async fn spawn_server_with_ui(generator: Arc<ScriptedGenerator>, ui: UiConfig) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(generator, ui);
    tokio::spawn(serve(listener, state, std::future::pending()));
    format!("http://{addr}")
}

fn hello_body() -> Value {
    json!({ "messages": [{ "role": "user", "content": "hi" }] })
}

async fn post_chat(base: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(body)
        .send()
        .await
        .unwrap()
}

// ============================================================================
// Chat Endpoint
// ============================================================================

#[tokio::test]
async fn test_chat_streams_frames_then_done() {
    let generator = Arc::new(ScriptedGenerator::replying(vec![Ok("he"), Ok(""), Ok("llo")]));
    let base = spawn_server(generator.clone()).await;

    let response = post_chat(&base, &hello_body()).await;
    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert!(headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(headers["cache-control"], "no-cache");

    let body = response.text().await.unwrap();
    assert_eq!(
        body,
        "data: {\"text\":\"he\"}\n\ndata: {\"text\":\"llo\"}\n\ndata: [DONE]\n\n"
    );
    assert_eq!(
        generator.requests(),
        vec![vec![ChatMessage::new(Role::User, "hi")]]
    );
}

#[tokio::test]
async fn test_chat_error_after_first_fragment_is_in_band() {
    let generator = Arc::new(ScriptedGenerator::replying(vec![
        Ok("partial"),
        Err("upstream reset"),
        Ok("never sent"),
    ]));
    let base = spawn_server(generator).await;

    let response = post_chat(&base, &hello_body()).await;
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert_eq!(
        body,
        "data: {\"text\":\"partial\"}\n\ndata: {\"error\":\"upstream reset\"}\n\n"
    );
    assert!(!body.contains("[DONE]"));
}

#[tokio::test]
async fn test_chat_error_before_first_fragment_is_500() {
    let generator = Arc::new(ScriptedGenerator::replying(vec![Err("model not found")]));
    let base = spawn_server(generator).await;

    let response = post_chat(&base, &hello_body()).await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "model not found" }));
}

#[tokio::test]
async fn test_chat_generator_start_failure_is_500() {
    let generator = Arc::new(ScriptedGenerator {
        start_error: Some("Ollama returned 503: overloaded".to_string()),
        ..ScriptedGenerator::default()
    });
    let base = spawn_server(generator).await;

    let response = post_chat(&base, &hello_body()).await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Ollama returned 503: overloaded" }));
}

#[tokio::test]
async fn test_chat_unconfigured_generator_is_500() {
    let generator = Arc::new(ScriptedGenerator {
        not_configured: Some("Model not configured".to_string()),
        ..ScriptedGenerator::default()
    });
    let base = spawn_server(generator.clone()).await;

    let response = post_chat(&base, &hello_body()).await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Model not configured" }));
    assert!(generator.requests().is_empty());
}

#[tokio::test]
async fn test_chat_rejects_bad_requests() {
    let generator = Arc::new(ScriptedGenerator::replying(vec![Ok("unused")]));
    let base = spawn_server(generator.clone()).await;

    for body in [
        json!({}),
        json!({ "messages": "hi" }),
        json!({ "messages": [] }),
        json!({ "messages": [{ "role": "user" }] }),
    ] {
        let response = post_chat(&base, &body).await;
        assert_eq!(response.status(), 400, "body {body}");
        let error: Value = response.json().await.unwrap();
        assert_eq!(error, json!({ "error": "messages required" }));
    }

    let response = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    assert!(generator.requests().is_empty());
}

#[tokio::test]
async fn test_chat_wrong_method_is_405() {
    let base = spawn_server(Arc::new(ScriptedGenerator::default())).await;

    let response = reqwest::get(format!("{base}/api/chat")).await.unwrap();
    assert_eq!(response.status(), 405);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Method not allowed" }));
}

#[tokio::test]
async fn test_chat_forwards_full_history_in_order() {
    let generator = Arc::new(ScriptedGenerator::replying(vec![Ok("fine")]));
    let base = spawn_server(generator.clone()).await;

    let body = json!({ "messages": [
        { "role": "user", "content": "hi" },
        { "role": "assistant", "content": "hello" },
        { "role": "user", "content": "how are you" },
    ]});
    let response = post_chat(&base, &body).await;
    assert_eq!(response.status(), 200);
    let _ = response.text().await.unwrap();

    assert_eq!(
        generator.requests(),
        vec![vec![
            ChatMessage::new(Role::User, "hi"),
            ChatMessage::new(Role::Assistant, "hello"),
            ChatMessage::new(Role::User, "how are you"),
        ]]
    );
}

// ============================================================================
// Config Endpoint
// ============================================================================

#[tokio::test]
async fn test_config_serves_ui_document() {
    let base = spawn_server(Arc::new(ScriptedGenerator::default())).await;

    let response = reqwest::get(format!("{base}/api/config")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    let ui = &body["ui"];
    assert_eq!(ui["typeSpeed"], 30.0);
    assert_eq!(ui["mouthInterval"], 120.0);
    assert_eq!(ui["beepFrequency"], 800.0);
    assert_eq!(ui["themeColor"], "#33ff99");
    assert_eq!(ui["nameTags"]["user"], "YOU");
    assert_eq!(ui["systemMessages"]["banner1"], "SYSTEM {avatarFullName} Online");
}

#[tokio::test]
async fn test_config_wrong_method_is_405() {
    let base = spawn_server(Arc::new(ScriptedGenerator::default())).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/config"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
}

// ============================================================================
// Engine Client Against The Daemon
// ============================================================================

#[tokio::test]
async fn test_engine_client_round_trip() {
    let mut ui = UiConfig::default();
    ui.type_speed = 10.0;
    ui.name_tags.avatar_full_name = "Test Unit".to_string();

    let generator = Arc::new(ScriptedGenerator::replying(vec![Ok("he"), Ok("llo")]));
    let base = spawn_server_with_ui(generator, ui).await;
    let client = HttpChatBackend::new(base).unwrap();

    let document = client.fetch_config().await.unwrap();
    assert_eq!(document.ui.type_speed, 10.0);
    assert_eq!(document.ui.banner_lines()[0], "> SYSTEM Test Unit Online");

    let body = client
        .open(&[ChatMessage::new(Role::User, "hi")])
        .await
        .unwrap();
    let mut frames = FrameStream::new(body);
    let mut seen = Vec::new();
    while let Some(frame) = frames.next().await {
        seen.push(frame);
    }

    assert_eq!(
        seen,
        vec![
            Frame::Text("he".to_string()),
            Frame::Text("llo".to_string()),
            Frame::Done,
        ]
    );
    assert_eq!(frames.stats().dropped_frames, 0);
}

#[tokio::test]
async fn test_engine_client_sees_pre_stream_error() {
    let generator = Arc::new(ScriptedGenerator {
        not_configured: Some("API key not configured".to_string()),
        ..ScriptedGenerator::default()
    });
    let base = spawn_server(generator).await;
    let client = HttpChatBackend::new(base).unwrap();

    let Err(err) = client.open(&[ChatMessage::new(Role::User, "hi")]).await else {
        panic!("expected a pre-stream error");
    };
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.user_message(), "API key not configured");
}
