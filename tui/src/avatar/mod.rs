//! Avatar
//!
//! A small blocky head whose mouth follows the engine's [`MouthState`].

mod sprites;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;

use retroterm_core::MouthState;

pub use sprites::{build_frame, ColoredCell, Frame};

use crate::theme::{Theme, EYE_WHITE};

/// Pre-built head frames for the current theme
#[derive(Clone, Debug)]
pub struct Avatar {
    closed: Frame,
    open: Frame,
}

impl Avatar {
    /// Build frames colored with the theme accent
    pub fn new(theme: &Theme) -> Self {
        Self {
            closed: sprites::head_closed(theme.accent, EYE_WHITE),
            open: sprites::head_open(theme.accent, EYE_WHITE),
        }
    }

    /// Frame for a mouth state
    pub fn frame(&self, mouth: MouthState) -> &Frame {
        match mouth {
            MouthState::Closed => &self.closed,
            MouthState::Open => &self.open,
        }
    }

    /// Size of the sprite in cells
    pub fn bounds(&self) -> (u16, u16) {
        (self.closed.width, self.closed.height)
    }

    /// Draw the head centered in `area`
    pub fn render(&self, mouth: MouthState, area: Rect, buf: &mut Buffer) {
        let frame = self.frame(mouth);

        let x_offset = area.width.saturating_sub(frame.width) / 2;
        let y_offset = area.height.saturating_sub(frame.height) / 2;

        for (row, y) in frame.cells.iter().zip(area.y + y_offset..area.bottom()) {
            for (cell, x) in row.iter().zip(area.x + x_offset..area.right()) {
                // Skip transparent cells
                if cell.is_empty() {
                    continue;
                }
                buf.set_string(x, y, cell.ch.to_string(), Style::default().fg(cell.fg));
            }
        }
    }
}

impl Default for Avatar {
    fn default() -> Self {
        Self::new(&Theme::default())
    }
}
