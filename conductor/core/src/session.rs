//! Session Management
//!
//! Conversation history between the user and the assistant.
//!
//! # Design Philosophy
//!
//! The [`ChatSession`] is the history the engine sends back to the generator
//! with every request. It only ever grows by appending finished turns, in
//! conversation order. Partial assistant output never lands here: a turn that
//! errors mid-stream is shown inline on the surface and then forgotten, so a
//! retry starts from a clean history.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a turn
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    /// Generate a fresh turn ID
    pub fn new() -> Self {
        Self(format!("turn_{}", Uuid::new_v4()))
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human at the keyboard
    User,
    /// The remote generator
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Lifecycle of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Created, nothing received yet
    Pending,
    /// At least one chunk has arrived
    Streaming,
    /// Ended with the done sentinel
    Complete,
    /// Ended with a terminal failure
    Errored,
}

impl TurnStatus {
    /// Whether the status is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnStatus::Complete | TurnStatus::Errored)
    }
}

/// One user or assistant message and its lifecycle status
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: TurnId,
    /// Who authored the turn
    pub role: Role,
    /// Accumulated text
    pub content: String,
    /// Lifecycle status
    status: TurnStatus,
    /// When the turn was created (Unix timestamp ms)
    pub created_at: u64,
}

impl Turn {
    /// Create a pending turn
    pub fn pending(role: Role) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content: String::new(),
            status: TurnStatus::Pending,
            created_at: now_ms(),
        }
    }

    /// Create a user turn that is complete on arrival
    pub fn user(content: impl Into<String>) -> Self {
        let mut turn = Self::pending(Role::User);
        turn.content = content.into();
        turn.status = TurnStatus::Complete;
        turn
    }

    /// Current status
    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Append streamed text; the first append moves the turn to `Streaming`.
    ///
    /// Returns `false` once the turn is terminal.
    pub fn append(&mut self, text: &str) -> bool {
        match self.status {
            TurnStatus::Complete | TurnStatus::Errored => false,
            TurnStatus::Pending | TurnStatus::Streaming => {
                self.status = TurnStatus::Streaming;
                self.content.push_str(text);
                true
            }
        }
    }

    /// Finish successfully
    pub fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = TurnStatus::Complete;
        }
    }

    /// Finish with a failure
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = TurnStatus::Errored;
        }
    }

    /// Wire form of the turn
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A `{role, content}` pair as sent to the chat endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request body of the streaming chat endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full ordered history, newest last
    pub messages: Vec<ChatMessage>,
}

/// Ordered history of completed turns
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatSession {
    turns: Vec<Turn>,
}

impl ChatSession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished turn.
    ///
    /// Turns that are not `Complete` are refused so errored partial output
    /// never reaches the history.
    pub fn commit(&mut self, turn: Turn) -> bool {
        if turn.status() != TurnStatus::Complete {
            tracing::debug!(
                turn = %turn.id,
                status = ?turn.status(),
                "Refusing to commit unfinished turn"
            );
            return false;
        }
        self.turns.push(turn);
        true
    }

    /// All committed turns in conversation order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of committed turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether nothing has been committed yet
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// History as wire messages
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(Turn::to_message).collect()
    }

    /// Request body carrying the full history
    pub fn to_request(&self) -> ChatRequest {
        ChatRequest {
            messages: self.to_messages(),
        }
    }
}

/// Get current timestamp in milliseconds
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
