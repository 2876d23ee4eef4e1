//! Theme and Colors
//!
//! Phosphor-terminal palette. The three accents come from the fetched UI
//! document; everything else is fixed.

use ratatui::style::{Color, Modifier, Style};

use retroterm_core::{Accents, LineKind, Rgb};

// ============================================================================
// Fixed Palette
// ============================================================================

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Screen background
pub const CRT_BLACK: Color = Color::Rgb(8, 12, 10);

/// Avatar eyes
pub const EYE_WHITE: Color = Color::Rgb(230, 255, 240);

// ============================================================================
// Theme
// ============================================================================

/// Colors in effect for the current session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    /// Assistant text, banners, avatar body
    pub accent: Color,
    /// User echo lines and the input line
    pub user: Color,
    /// Status bar highlights
    pub tool: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_accents(Accents::default())
    }
}

impl Theme {
    /// Build a theme from parsed accents
    pub fn from_accents(accents: Accents) -> Self {
        Self {
            accent: rgb(accents.theme),
            user: rgb(accents.user),
            tool: rgb(accents.tool),
        }
    }

    /// Style of a transcript line
    pub fn line_style(&self, kind: LineKind) -> Style {
        match kind {
            LineKind::System => Style::default().fg(self.accent).add_modifier(Modifier::DIM),
            LineKind::User => Style::default().fg(self.user),
            LineKind::Assistant => Style::default().fg(self.accent),
            LineKind::Error => Style::default().fg(ERROR_RED),
        }
    }
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}
