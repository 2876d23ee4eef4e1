//! Sprite Definitions
//!
//! Blocky pixel art using Unicode block elements and colors.
//! Each cell has its own foreground color.

use std::collections::HashMap;

use ratatui::style::Color;

/// A single colored cell in a sprite
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColoredCell {
    /// The character to display
    pub ch: char,
    /// Foreground color
    pub fg: Color,
}

impl ColoredCell {
    /// Create a new colored cell
    pub const fn new(ch: char, fg: Color) -> Self {
        Self { ch, fg }
    }

    /// Empty/transparent cell
    pub const fn empty() -> Self {
        Self {
            ch: ' ',
            fg: Color::Reset,
        }
    }

    /// Check if cell is empty/transparent
    pub fn is_empty(&self) -> bool {
        self.ch == ' '
    }
}

/// One still image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// 2D grid of colored cells (row-major)
    pub cells: Vec<Vec<ColoredCell>>,
    /// Width in terminal cells
    pub width: u16,
    /// Height in terminal cells
    pub height: u16,
}

impl Frame {
    /// Create a frame from a grid of colored cells
    pub fn new(cells: Vec<Vec<ColoredCell>>) -> Self {
        let height = u16::try_from(cells.len()).unwrap_or(u16::MAX);
        let width = cells
            .iter()
            .map(|row| u16::try_from(row.len()).unwrap_or(u16::MAX))
            .max()
            .unwrap_or(0);

        Self {
            cells,
            width,
            height,
        }
    }
}

// ============================================================================
// Sprite Builder
// ============================================================================

/// Parse a sprite definition using a color map
///
/// Each character in the pattern maps to a `(char, Color)` in the palette.
/// A space is always transparent; unknown characters are drawn as-is.
pub fn build_frame(pattern: &[&str], palette: &[(char, char, Color)]) -> Frame {
    let color_map: HashMap<char, (char, Color)> = palette
        .iter()
        .map(|&(key, ch, color)| (key, (ch, color)))
        .collect();

    let cells = pattern
        .iter()
        .map(|line| {
            line.chars()
                .map(|c| {
                    if c == ' ' {
                        ColoredCell::empty()
                    } else if let Some(&(ch, color)) = color_map.get(&c) {
                        ColoredCell::new(ch, color)
                    } else {
                        ColoredCell::new(c, Color::Reset)
                    }
                })
                .collect()
        })
        .collect();

    Frame::new(cells)
}

// ============================================================================
// Head Sprites
// ============================================================================

const HEAD_CLOSED: &[&str] = &[
    " ▄BBBBB▄ ",
    " B e e B ",
    " B  m  B ",
    "  ▀BBB▀  ",
];

const HEAD_OPEN: &[&str] = &[
    " ▄BBBBB▄ ",
    " B e e B ",
    " B  O  B ",
    "  ▀BBB▀  ",
];

fn head_palette(body: Color, eyes: Color) -> [(char, char, Color); 5] {
    [
        ('B', '█', body),
        ('▄', '▄', body),
        ('▀', '▀', body),
        ('e', '●', eyes),
        ('m', '─', eyes),
    ]
}

/// The head with its mouth closed
pub fn head_closed(body: Color, eyes: Color) -> Frame {
    build_frame(HEAD_CLOSED, &head_palette(body, eyes))
}

/// The head with its mouth open
pub fn head_open(body: Color, eyes: Color) -> Frame {
    let mut palette = head_palette(body, eyes).to_vec();
    palette.push(('O', '◯', eyes));
    build_frame(HEAD_OPEN, &palette)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_frame_maps_palette() {
        let frame = build_frame(&["aB ", "?"], &[('a', 'x', Color::Red)]);
        assert_eq!(frame.width, 3);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.cells[0][0], ColoredCell::new('x', Color::Red));
        assert_eq!(frame.cells[0][1], ColoredCell::new('B', Color::Reset));
        assert!(frame.cells[0][2].is_empty());
    }

    #[test]
    fn test_heads_differ_only_in_mouth() {
        let closed = head_closed(Color::Green, Color::White);
        let open = head_open(Color::Green, Color::White);
        assert_eq!((closed.width, closed.height), (open.width, open.height));

        let differing: Vec<_> = closed
            .cells
            .iter()
            .flatten()
            .zip(open.cells.iter().flatten())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(differing.len(), 1);
        assert_eq!(differing[0].1.ch, '◯');
    }
}
