//! Surface Integration Tests
//!
//! Drives the real engine into the terminal [`Screen`] with a canned chat
//! body, on paused time.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use retroterm_core::stream::Frame;
use retroterm_core::{
    BackendError, ByteStream, ChatBackend, ChatMessage, EngineConfig, LineKind, MouthState,
    SubmitOutcome, TurnSession, Viewport,
};
use retroterm_tui::markdown;
use retroterm_tui::screen::{Screen, ANCHOR_ROWS};

/// Answers exactly one request with a fixed body
struct OneReply(Mutex<Option<ByteStream>>);

impl OneReply {
    fn new(frames: &[Frame]) -> Arc<Self> {
        let body: String = frames.iter().map(Frame::encode).collect();
        let stream = stream::iter(vec![Ok(Bytes::from(body))]).boxed();
        Arc::new(Self(Mutex::new(Some(stream))))
    }
}

#[async_trait]
impl ChatBackend for OneReply {
    async fn open(&self, _messages: &[ChatMessage]) -> Result<ByteStream, BackendError> {
        self.0
            .lock()
            .take()
            .ok_or_else(|| BackendError::Stream("no reply left".to_string()))
    }
}

fn session(backend: Arc<OneReply>, screen: &Arc<Mutex<Screen>>) -> TurnSession<Screen> {
    let mut config = EngineConfig::default().muted();
    config.scroll_threshold = ANCHOR_ROWS;
    TurnSession::builder(backend, Arc::clone(screen))
        .config(config)
        .markdown(markdown::renderer())
        .user_tag("YOU> ")
        .build()
}

#[tokio::test(start_paused = true)]
async fn test_reply_types_out_then_renders_markdown() {
    let backend = OneReply::new(&[
        Frame::Text("**hi** ".to_string()),
        Frame::Text("there".to_string()),
        Frame::Done,
    ]);
    let screen = Arc::new(Mutex::new(Screen::new(40, 10)));
    let session = session(backend, &screen);

    assert_eq!(session.submit("hello").await, SubmitOutcome::Completed);

    let screen = screen.lock();
    let lines: Vec<(LineKind, &str)> = screen
        .lines()
        .iter()
        .map(|line| (line.kind, line.text.as_str()))
        .collect();
    assert_eq!(
        lines,
        vec![(LineKind::User, "YOU> hello"), (LineKind::Assistant, "hi there")]
    );
    assert!(!screen.is_streaming());
    assert_eq!(screen.mouth(), MouthState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_long_reply_keeps_bottom_in_view() {
    let backend = OneReply::new(&[
        Frame::Text("one two three four five six seven eight".to_string()),
        Frame::Done,
    ]);
    let screen = Arc::new(Mutex::new(Screen::new(10, 2)));
    let session = session(backend, &screen);

    assert_eq!(session.submit("go").await, SubmitOutcome::Completed);

    let screen = screen.lock();
    assert!(screen.scroll_height() > 2.0);
    assert_eq!(screen.distance_from_bottom(), 0.0);
    assert_eq!(screen.rows_below(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_error_frame_shows_inline_notice() {
    let backend = OneReply::new(&[
        Frame::Text("par".to_string()),
        Frame::Error("quota exceeded".to_string()),
    ]);
    let screen = Arc::new(Mutex::new(Screen::new(40, 10)));
    let session = session(backend, &screen);

    assert!(matches!(
        session.submit("hello").await,
        SubmitOutcome::Errored(_)
    ));

    let screen = screen.lock();
    let last = screen.lines().last().cloned().unwrap();
    assert_eq!(last.kind, LineKind::Error);
    assert_eq!(last.text, "Error: quota exceeded");
    assert!(session.history().len() == 1);
}
