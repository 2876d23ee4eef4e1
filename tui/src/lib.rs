//! Retroterm TUI - Terminal surface for the retroterm engine
//!
//! A full-screen phosphor terminal: the transcript types itself out, a small
//! blocky head talks along, and the bell chirps while text is revealed.
//!
//! # Architecture
//!
//! - **Screen**: implements the engine's surface traits over a wrapped transcript
//! - **Avatar**: two-frame sprite driven by the engine's mouth state
//! - **Markdown**: finished replies re-rendered to plain terminal text
//! - **Audio**: terminal bell as the engine's audio sink

pub mod app;
pub mod audio;
pub mod avatar;
pub mod markdown;
pub mod screen;
pub mod theme;

pub use app::App;
