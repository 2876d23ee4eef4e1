//! Transcript Screen
//!
//! The terminal's implementation of the engine's surface traits. The engine
//! writes lines and units into it from the turn task; the app reads it back
//! every frame to draw.
//!
//! Viewport units are wrapped terminal rows.

use std::borrow::Cow;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use retroterm_core::{AvatarSink, LineKind, MouthState, RenderSink, RenderUnit, Viewport};

use crate::theme::Theme;

/// Rows from the bottom that still count as anchored
pub const ANCHOR_ROWS: f64 = 2.0;

/// One logical transcript line, may wrap to several rows
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptLine {
    /// Styling class
    pub kind: LineKind,
    /// Raw text, may contain newlines after markdown rendering
    pub text: String,
}

/// Transcript, viewport and avatar state shared with the engine
#[derive(Debug)]
pub struct Screen {
    lines: Vec<TranscriptLine>,
    /// Wrapped row count of each line at the current width
    line_rows: Vec<usize>,
    /// Sum of `line_rows`
    total_rows: usize,
    /// Message currently receiving units
    open: Option<usize>,
    width: u16,
    height: u16,
    scroll_top: usize,
    mouth: MouthState,
}

impl Screen {
    /// Create an empty screen with a transcript area of `width` x `height`
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            lines: Vec::new(),
            line_rows: Vec::new(),
            total_rows: 0,
            open: None,
            width,
            height,
            scroll_top: 0,
            mouth: MouthState::Closed,
        }
    }

    /// Track a new transcript area size
    pub fn resize(&mut self, width: u16, height: u16) {
        if width != self.width {
            self.width = width;
            self.line_rows = self.lines.iter().map(|line| self.wrap(&line.text).len()).collect();
            self.total_rows = self.line_rows.iter().sum();
        }
        self.height = height;
        self.scroll_top = self.scroll_top.min(self.max_top());
    }

    /// Logical lines
    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    /// Current mouth state
    pub fn mouth(&self) -> MouthState {
        self.mouth
    }

    /// Whether a message is still receiving units
    pub fn is_streaming(&self) -> bool {
        self.open.is_some()
    }

    /// Every wrapped row of the transcript
    pub fn rows(&self) -> Vec<(LineKind, String)> {
        self.lines
            .iter()
            .flat_map(|line| self.wrap(&line.text).into_iter().map(|row| (line.kind, row)))
            .collect()
    }

    /// Rows inside the viewport; only lines that reach it are wrapped
    pub fn visible_rows(&self) -> Vec<(LineKind, String)> {
        let height = usize::from(self.height);
        let mut visible = Vec::with_capacity(height);
        let mut first_row = 0;
        for (line, &count) in self.lines.iter().zip(&self.line_rows) {
            if visible.len() >= height {
                break;
            }
            if first_row + count > self.scroll_top {
                let skip = self.scroll_top.saturating_sub(first_row);
                visible.extend(
                    self.wrap(&line.text)
                        .into_iter()
                        .skip(skip)
                        .take(height - visible.len())
                        .map(|row| (line.kind, row)),
                );
            }
            first_row += count;
        }
        visible
    }

    /// Move the viewport by `delta` rows, negative is up
    pub fn scroll_by(&mut self, delta: isize) {
        let top = self.scroll_top.saturating_add_signed(delta);
        self.scroll_top = top.min(self.max_top());
    }

    /// Jump to the newest row
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_top();
    }

    /// Rows hidden below the viewport
    pub fn rows_below(&self) -> usize {
        self.max_top().saturating_sub(self.scroll_top)
    }

    fn row_count(&self) -> usize {
        self.total_rows
    }

    fn wrap(&self, text: &str) -> Vec<String> {
        let width = usize::from(self.width.max(1));
        text.split('\n')
            .flat_map(|segment| textwrap::wrap(segment, width).into_iter().map(Cow::into_owned))
            .collect()
    }

    fn push_line(&mut self, kind: LineKind, text: String) {
        let count = self.wrap(&text).len();
        self.lines.push(TranscriptLine { kind, text });
        self.line_rows.push(count);
        self.total_rows += count;
    }

    /// Re-measure one line after its text changed
    fn rewrap(&mut self, index: usize) {
        let Some(line) = self.lines.get(index) else {
            return;
        };
        let count = self.wrap(&line.text).len();
        if let Some(old) = self.line_rows.get_mut(index) {
            self.total_rows = self.total_rows - *old + count;
            *old = count;
        }
    }

    fn max_top(&self) -> usize {
        self.row_count().saturating_sub(usize::from(self.height))
    }

    /// Draw the visible rows into `area`
    pub fn render(&self, theme: &Theme, area: Rect, buf: &mut Buffer) {
        for ((kind, row), y) in self.visible_rows().iter().zip(area.y..area.bottom()) {
            buf.set_stringn(
                area.x,
                y,
                row,
                usize::from(area.width),
                theme.line_style(*kind),
            );
        }
    }
}

impl RenderSink for Screen {
    fn begin_message(&mut self, kind: LineKind) {
        self.push_line(kind, String::new());
        self.open = Some(self.lines.len() - 1);
    }

    fn push_unit(&mut self, unit: &RenderUnit) {
        let Some(index) = self.open else {
            return;
        };
        if let Some(line) = self.lines.get_mut(index) {
            line.text.push_str(&unit.unit);
            self.rewrap(index);
        }
    }

    fn complete_message(&mut self, markup: &str) {
        let Some(index) = self.open.take() else {
            return;
        };
        if let Some(line) = self.lines.get_mut(index) {
            line.text = markup.to_string();
            self.rewrap(index);
        }
    }

    fn append_line(&mut self, kind: LineKind, text: &str) {
        self.open = None;
        self.push_line(kind, text.to_string());
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.line_rows.clear();
        self.total_rows = 0;
        self.open = None;
        self.scroll_top = 0;
    }
}

impl Viewport for Screen {
    fn scroll_height(&self) -> f64 {
        self.row_count() as f64
    }

    fn client_height(&self) -> f64 {
        f64::from(self.height)
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top as f64
    }

    fn set_scroll_top(&mut self, top: f64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let top = top.max(0.0).round() as usize;
        self.scroll_top = top.min(self.max_top());
    }
}

impl AvatarSink for Screen {
    fn set_mouth(&mut self, mouth: MouthState) {
        self.mouth = mouth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use retroterm_core::AutoScrollController;

    fn unit(text: &str) -> RenderUnit {
        RenderUnit {
            unit: text.to_string(),
            text_so_far: String::new(),
        }
    }

    fn filled(lines: usize) -> Screen {
        let mut screen = Screen::new(20, 5);
        for i in 0..lines {
            screen.append_line(LineKind::System, &format!("line {i}"));
        }
        screen
    }

    #[test]
    fn test_units_append_to_open_message() {
        let mut screen = Screen::new(20, 5);
        screen.append_line(LineKind::User, "YOU> hi");
        screen.begin_message(LineKind::Assistant);
        screen.push_unit(&unit("h"));
        screen.push_unit(&unit("i"));
        assert!(screen.is_streaming());
        assert_eq!(screen.lines()[1].text, "hi");

        screen.complete_message("hi!");
        assert!(!screen.is_streaming());
        assert_eq!(
            screen.lines(),
            &[
                TranscriptLine {
                    kind: LineKind::User,
                    text: "YOU> hi".to_string()
                },
                TranscriptLine {
                    kind: LineKind::Assistant,
                    text: "hi!".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_units_without_open_message_are_ignored() {
        let mut screen = Screen::new(20, 5);
        screen.append_line(LineKind::System, "> ready");
        screen.push_unit(&unit("x"));
        assert_eq!(screen.lines()[0].text, "> ready");
    }

    #[test]
    fn test_rows_wrap_and_split() {
        let mut screen = Screen::new(10, 5);
        screen.append_line(LineKind::Assistant, "first line\nsecond one here");
        let rows: Vec<String> = screen.rows().into_iter().map(|(_, r)| r).collect();
        assert_eq!(rows, vec!["first line", "second one", "here"]);
        assert_eq!(screen.scroll_height(), 3.0);
    }

    #[test]
    fn test_viewport_clamps() {
        let mut screen = filled(12);
        assert_eq!(screen.max_scroll_top(), 7.0);

        screen.set_scroll_top(100.0);
        assert_eq!(screen.scroll_top(), 7.0);
        assert_eq!(screen.distance_from_bottom(), 0.0);

        screen.scroll_by(-3);
        assert_eq!(screen.scroll_top(), 4.0);
        assert_eq!(screen.rows_below(), 3);

        screen.scroll_by(-100);
        assert_eq!(screen.scroll_top(), 0.0);
    }

    #[test]
    fn test_anchored_controller_follows_new_rows() {
        let mut screen = filled(4);
        let mut scroll = AutoScrollController::new(ANCHOR_ROWS);

        screen.append_line(LineKind::System, "more");
        screen.append_line(LineKind::System, "and more");
        assert!(scroll.after_append(&mut screen));
        assert_eq!(screen.scroll_top(), 1.0);

        screen.scroll_by(-1);
        scroll.on_scroll(&screen);
        assert!(scroll.is_anchored());

        screen.append_line(LineKind::System, "a");
        screen.append_line(LineKind::System, "b");
        screen.append_line(LineKind::System, "c");
        screen.scroll_by(-10);
        scroll.on_scroll(&screen);
        assert!(!scroll.is_anchored());
        assert!(!scroll.after_append(&mut screen));
        assert_eq!(screen.scroll_top(), 0.0);
    }

    #[test]
    fn test_row_count_tracks_edits_and_resize() {
        let mut screen = Screen::new(10, 3);
        screen.append_line(LineKind::User, "YOU> hi");
        screen.begin_message(LineKind::Assistant);
        for ch in "one two three four".chars() {
            screen.push_unit(&unit(&ch.to_string()));
            assert_eq!(screen.scroll_height(), screen.rows().len() as f64);
        }
        assert_eq!(screen.scroll_height(), 3.0);

        screen.complete_message("done");
        assert_eq!(screen.scroll_height(), 2.0);

        screen.append_line(LineKind::System, "a\nb\nc");
        screen.resize(4, 3);
        assert_eq!(screen.scroll_height(), screen.rows().len() as f64);
        assert_eq!(screen.scroll_height(), 6.0);
    }

    #[test]
    fn test_visible_rows_match_full_wrap() {
        let mut screen = Screen::new(6, 3);
        screen.append_line(LineKind::System, "alpha beta gamma");
        screen.append_line(LineKind::Assistant, "x\ny");
        screen.append_line(LineKind::User, "delta");
        for top in 0..6 {
            screen.set_scroll_top(f64::from(top));
            let expected: Vec<(LineKind, String)> = screen
                .rows()
                .into_iter()
                .skip(screen.scroll_top() as usize)
                .take(3)
                .collect();
            assert_eq!(screen.visible_rows(), expected);
        }
    }

    #[test]
    fn test_clear_resets_viewport() {
        let mut screen = filled(12);
        screen.scroll_to_bottom();
        screen.clear();
        assert!(screen.lines().is_empty());
        assert_eq!(screen.scroll_top(), 0.0);
    }

    #[test]
    fn test_render_visible_rows() {
        let mut screen = filled(8);
        screen.scroll_to_bottom();
        let area = Rect::new(0, 0, 20, 5);
        let mut buf = Buffer::empty(area);
        screen.render(&Theme::default(), area, &mut buf);

        let first_row: String = (0..6u16)
            .map(|x| buf[(x, 0u16)].symbol().to_string())
            .collect();
        assert_eq!(first_row, "line 3");
    }

    #[test]
    fn test_mouth_follows_sink() {
        let mut screen = Screen::new(20, 5);
        screen.set_mouth(MouthState::Open);
        assert_eq!(screen.mouth(), MouthState::Open);
    }
}
