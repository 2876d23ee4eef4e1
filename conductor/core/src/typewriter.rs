//! Typewriter Queue
//!
//! Decouples the rate at which text arrives from the network from the rate at
//! which it is revealed to the reader.
//!
//! The producer side (`enqueue`) never blocks and accepts fragments of any
//! size. The consumer side hands out one grapheme cluster per tick. Ticks are
//! driven by the owner through [`Cadence`], which the turn loop awaits on with
//! `tokio::time::sleep_until`, so the queue itself holds no timers.
//!
//! # Resource growth
//!
//! With [`OverflowPolicy::Unbounded`] (the default) the FIFO grows with the
//! producer. That is fine for human-speed chat text. [`TypewriterQueue::with_capacity`]
//! caps the FIFO; with [`OverflowPolicy::Coalesce`] any text beyond the cap is
//! merged into the last buffered unit and revealed in a single step.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use unicode_segmentation::UnicodeSegmentation;

// ============================================================================
// Render Units
// ============================================================================

/// What the queue emits downstream on each tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderUnit {
    /// The revealed text, normally one grapheme cluster
    pub unit: String,
    /// Everything revealed so far in this turn, `unit` included
    pub text_so_far: String,
}

/// How the FIFO behaves once it reaches its capacity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// No cap, the FIFO grows with the producer
    #[default]
    Unbounded,
    /// Merge overflowing text into the last buffered unit
    Coalesce,
}

/// Counters for one queue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Units accepted by `enqueue`
    pub units_enqueued: u64,
    /// Units handed out, by tick or flush
    pub units_emitted: u64,
    /// Units merged into another because of the cap
    pub units_coalesced: u64,
    /// High-water mark of the FIFO
    pub peak_depth: usize,
}

// ============================================================================
// Queue
// ============================================================================

/// FIFO of pending render units for the turn currently streaming
#[derive(Debug)]
pub struct TypewriterQueue {
    fifo: VecDeque<String>,
    revealed: String,
    capacity: Option<usize>,
    policy: OverflowPolicy,
    end_of_stream: bool,
    finished_reported: bool,
    stats: QueueStats,
}

impl Default for TypewriterQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TypewriterQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self {
            fifo: VecDeque::new(),
            revealed: String::new(),
            capacity: None,
            policy: OverflowPolicy::Unbounded,
            end_of_stream: false,
            finished_reported: false,
            stats: QueueStats::default(),
        }
    }

    /// Create a queue capped at `capacity` units.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = match policy {
            OverflowPolicy::Unbounded => None,
            OverflowPolicy::Coalesce => Some(capacity.max(1)),
        };
        Self {
            fifo: VecDeque::with_capacity(capacity.unwrap_or_default()),
            capacity,
            policy,
            ..Self::new()
        }
    }

    /// Append every grapheme of `text`, in order.
    ///
    /// Returns the number of units that now sit in the FIFO because of this
    /// call. Text arriving after [`mark_end_of_stream`](Self::mark_end_of_stream)
    /// is refused.
    pub fn enqueue(&mut self, text: &str) -> usize {
        if self.end_of_stream {
            tracing::debug!(len = text.len(), "Refusing enqueue after end of stream");
            return 0;
        }

        let mut added = 0;
        for grapheme in text.graphemes(true) {
            self.stats.units_enqueued += 1;
            let depth = self.fifo.len();
            match (self.capacity, self.fifo.back_mut()) {
                (Some(cap), Some(last)) if depth >= cap => {
                    last.push_str(grapheme);
                    self.stats.units_coalesced += 1;
                }
                _ => {
                    self.fifo.push_back(grapheme.to_string());
                    added += 1;
                }
            }
        }
        self.stats.peak_depth = self.stats.peak_depth.max(self.fifo.len());
        added
    }

    /// Take the next unit, if any
    pub fn next_unit(&mut self) -> Option<RenderUnit> {
        let unit = self.fifo.pop_front()?;
        self.revealed.push_str(&unit);
        self.stats.units_emitted += 1;
        Some(RenderUnit {
            unit,
            text_so_far: self.revealed.clone(),
        })
    }

    /// Signal that no more text will be enqueued
    pub fn mark_end_of_stream(&mut self) {
        self.end_of_stream = true;
    }

    /// Drain the whole FIFO in one pass, ignoring the cadence
    pub fn flush_immediately(&mut self) -> Vec<RenderUnit> {
        let mut units = Vec::with_capacity(self.fifo.len());
        while let Some(unit) = self.next_unit() {
            units.push(unit);
        }
        units
    }

    /// Reports `true` exactly once: the first call after the FIFO has drained
    /// following end of stream.
    pub fn take_finished(&mut self) -> bool {
        if self.end_of_stream && self.fifo.is_empty() && !self.finished_reported {
            self.finished_reported = true;
            return true;
        }
        false
    }

    /// Whether units are waiting to be revealed
    pub fn is_speaking(&self) -> bool {
        !self.fifo.is_empty()
    }

    /// Number of buffered units
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Whether the FIFO is empty
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Whether end of stream has been signalled
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Everything revealed so far
    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    /// Overflow policy in effect
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Counters so far
    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

// ============================================================================
// Cadence
// ============================================================================

/// Fixed-period tick schedule for revealing units.
///
/// The first tick is due immediately. Each tick schedules the next one a full
/// period after the time it actually fired, so N ticks never span less than
/// `(N - 1) * period`.
#[derive(Clone, Debug)]
pub struct Cadence {
    period: Duration,
    next_at: Option<Instant>,
}

impl Cadence {
    /// Create a schedule with the given period
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_at: None,
        }
    }

    /// The tick period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the next tick is due; `now` if nothing has fired yet
    pub fn deadline(&self, now: Instant) -> Instant {
        self.next_at.unwrap_or(now)
    }

    /// Whether a tick is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline(now) <= now
    }

    /// Record a tick fired at `now`
    pub fn fired(&mut self, now: Instant) {
        self.next_at = Some(now + self.period);
    }
}
