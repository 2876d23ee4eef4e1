//! Render sink
//!
//! The boundary between the engine and whatever draws the transcript. The
//! engine never formats anything itself: it tells the sink which kind of line
//! to start, hands it revealed units, and at the end of a turn hands it the
//! finished text rendered through a [`MarkdownRenderer`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::UiConfig;
use crate::typewriter::RenderUnit;

/// Shown while the configuration is being fetched
pub const CONNECTING_LINE: &str = "> Connecting...";

/// Shown when the configuration could not be fetched
pub const CONNECT_FAILED_LINE: &str = "> Failed to connect";

/// Kind of a transcript line, selects its styling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Banners and connection notices
    System,
    /// Echo of the user's input
    User,
    /// Streamed assistant output
    Assistant,
    /// Inline failure notice
    Error,
}

/// Receives transcript updates
pub trait RenderSink {
    /// Start a new, empty message that units will be appended to
    fn begin_message(&mut self, kind: LineKind);

    /// Append one revealed unit to the current message
    fn push_unit(&mut self, unit: &RenderUnit);

    /// Replace the current message's raw rendition with finished markup
    fn complete_message(&mut self, markup: &str);

    /// Append a complete line
    fn append_line(&mut self, kind: LineKind, text: &str);

    /// Remove every line
    fn clear(&mut self);
}

/// Pure function from raw assistant text to safe display markup
pub type MarkdownRenderer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Renderer that returns its input unchanged
pub fn plain_text() -> MarkdownRenderer {
    Arc::new(|raw: &str| raw.to_string())
}

/// Show the connecting notice
pub fn show_connecting(sink: &mut dyn RenderSink) {
    sink.clear();
    sink.append_line(LineKind::System, CONNECTING_LINE);
}

/// Replace the transcript with the connection failure notice
pub fn show_connect_failed(sink: &mut dyn RenderSink) {
    sink.clear();
    sink.append_line(LineKind::Error, CONNECT_FAILED_LINE);
}

/// Replace the transcript with the configured banners
pub fn show_banners(sink: &mut dyn RenderSink, ui: &UiConfig) {
    sink.clear();
    for line in ui.banner_lines() {
        sink.append_line(LineKind::System, &line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lines(Vec<(LineKind, String)>);

    impl RenderSink for Lines {
        fn begin_message(&mut self, kind: LineKind) {
            self.0.push((kind, String::new()));
        }
        fn push_unit(&mut self, unit: &RenderUnit) {
            if let Some((_, text)) = self.0.last_mut() {
                text.push_str(&unit.unit);
            }
        }
        fn complete_message(&mut self, markup: &str) {
            if let Some((_, text)) = self.0.last_mut() {
                *text = markup.to_string();
            }
        }
        fn append_line(&mut self, kind: LineKind, text: &str) {
            self.0.push((kind, text.to_string()));
        }
        fn clear(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn test_startup_sequence() {
        let mut lines = Lines::default();
        show_connecting(&mut lines);
        assert_eq!(lines.0, vec![(LineKind::System, CONNECTING_LINE.to_string())]);

        show_banners(&mut lines, &UiConfig::default());
        assert_eq!(lines.0.len(), 2);
        assert_eq!(lines.0[0].1, "> SYSTEM Misa AI Online");

        show_connect_failed(&mut lines);
        assert_eq!(lines.0, vec![(LineKind::Error, CONNECT_FAILED_LINE.to_string())]);
    }

    #[test]
    fn test_plain_text_is_identity() {
        let render = plain_text();
        assert_eq!(render("**hi**"), "**hi**");
    }

    #[test]
    fn test_line_kind_serialization() {
        assert_eq!(serde_json::to_string(&LineKind::Error).unwrap(), "\"error\"");
    }
}
