//! Auto-scroll
//!
//! Keeps the transcript pinned to its newest line while the reader is at the
//! bottom, and leaves it alone once they scroll up to read history.

/// Distance from the bottom, in viewport units, that still counts as anchored
pub const ANCHOR_THRESHOLD: f64 = 50.0;

/// A scrollable transcript area.
///
/// Units are whatever the surface measures in: pixels for a browser, rows for
/// a terminal. `scroll_top` is the offset of the first visible unit.
pub trait Viewport {
    /// Total content height
    fn scroll_height(&self) -> f64;

    /// Visible height
    fn client_height(&self) -> f64;

    /// Current offset from the top
    fn scroll_top(&self) -> f64;

    /// Move the viewport
    fn set_scroll_top(&mut self, top: f64);

    /// Largest valid offset
    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height() - self.client_height()).max(0.0)
    }

    /// Distance between the bottom of the viewport and the end of content
    fn distance_from_bottom(&self) -> f64 {
        self.scroll_height() - self.scroll_top() - self.client_height()
    }
}

/// Tracks whether the viewport is anchored to the bottom
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoScrollController {
    anchored: bool,
    threshold: f64,
}

impl Default for AutoScrollController {
    fn default() -> Self {
        Self::new(ANCHOR_THRESHOLD)
    }
}

impl AutoScrollController {
    /// Create an anchored controller
    pub fn new(threshold: f64) -> Self {
        Self {
            anchored: true,
            threshold,
        }
    }

    /// Recompute the anchor after the viewport moved
    pub fn on_scroll(&mut self, viewport: &dyn Viewport) {
        let anchored = viewport.distance_from_bottom() < self.threshold;
        if anchored != self.anchored {
            tracing::trace!(anchored, "Scroll anchor changed");
        }
        self.anchored = anchored;
    }

    /// Content was appended: pin to the new bottom if anchored beforehand.
    ///
    /// Returns whether the viewport moved.
    pub fn after_append(&mut self, viewport: &mut dyn Viewport) -> bool {
        if !self.anchored {
            return false;
        }
        let bottom = viewport.max_scroll_top();
        viewport.set_scroll_top(bottom);
        true
    }

    /// Whether appends currently follow the bottom
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// The anchor band
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
