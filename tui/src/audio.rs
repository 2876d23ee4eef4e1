//! Terminal bell audio
//!
//! A terminal cannot synthesize a tone, so each audible cue rings the bell.
//! Frequency and envelope are carried by the cue but not reproduced here.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use retroterm_core::{AudioSink, BeepCue};

const BEL: &[u8] = b"\x07";

/// Rings BEL on the controlling terminal for every audible cue
#[derive(Debug, Default)]
pub struct TerminalBell {
    rung: AtomicU64,
}

impl TerminalBell {
    /// Create a bell
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the bell was rung
    pub fn rung(&self) -> u64 {
        self.rung.load(Ordering::Relaxed)
    }

    /// Ring through an arbitrary writer
    fn ring(&self, out: &mut dyn Write, cue: &BeepCue) {
        if !cue.is_audible() {
            return;
        }
        match out.write_all(BEL).and_then(|()| out.flush()) {
            Ok(()) => {
                self.rung.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => tracing::trace!(error = %e, "Bell write failed"),
        }
    }
}

impl AudioSink for TerminalBell {
    fn play(&self, cue: &BeepCue) {
        self.ring(&mut std::io::stdout().lock(), cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audible_cue_rings_once() {
        let bell = TerminalBell::new();
        let mut out = Vec::new();
        bell.ring(&mut out, &BeepCue::default());
        assert_eq!(out, BEL);
        assert_eq!(bell.rung(), 1);
    }

    #[test]
    fn test_silent_cue_does_not_ring() {
        let bell = TerminalBell::new();
        let mut out = Vec::new();
        let cue = BeepCue {
            volume: 0.0,
            ..BeepCue::default()
        };
        bell.ring(&mut out, &cue);
        assert!(out.is_empty());
        assert_eq!(bell.rung(), 0);
    }
}
