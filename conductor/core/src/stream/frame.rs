//! Wire frames written by the chat endpoint.

use serde::{Deserialize, Serialize};

/// Line prefix that marks a data frame
pub const DATA_PREFIX: &str = "data: ";

/// Reserved payload marking end-of-stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// JSON body of a non-sentinel frame
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePayload {
    /// Text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Terminal error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One discrete unit of the streaming protocol
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A text fragment
    Text(String),
    /// An in-band error, sent after headers were committed
    Error(String),
    /// End-of-stream sentinel
    Done,
}

impl Frame {
    /// The payload that follows `data: `
    pub fn payload(&self) -> String {
        match self {
            Frame::Text(text) => json_payload(FramePayload {
                text: Some(text.clone()),
                error: None,
            }),
            Frame::Error(error) => json_payload(FramePayload {
                text: None,
                error: Some(error.clone()),
            }),
            Frame::Done => DONE_SENTINEL.to_string(),
        }
    }

    /// The complete frame, terminator included
    pub fn encode(&self) -> String {
        format!("{DATA_PREFIX}{}\n\n", self.payload())
    }
}

fn json_payload(payload: FramePayload) -> String {
    // Serializing two optional strings cannot fail
    serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"))
}
