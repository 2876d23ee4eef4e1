//! Streaming Chat Protocol
//!
//! The chat endpoint answers with a server-sent-event style body. Every frame
//! is a single `data: <payload>` line followed by a blank line:
//!
//! ```text
//! data: {"text":"he"}
//!
//! data: {"text":"llo"}
//!
//! data: [DONE]
//!
//! ```
//!
//! A payload is either `{"text": ...}`, `{"error": ...}`, or the literal
//! [`DONE_SENTINEL`]. The [`frame`] half is used by the daemon to write
//! frames; the [`decoder`] half turns raw network fragments back into
//! [`Frame`]s on the client.

pub mod decoder;
pub mod frame;

pub use decoder::{DecoderStats, FrameStream, StreamFrameDecoder};
pub use frame::{Frame, FramePayload, DATA_PREFIX, DONE_SENTINEL};
