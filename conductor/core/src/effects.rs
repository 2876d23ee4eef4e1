//! Side Effect Scheduler
//!
//! Drives the cosmetic effects that accompany revealed text: the avatar's
//! mouth flapping between open and closed, and a short retro beep per
//! revealed unit.
//!
//! Like the typewriter, the scheduler owns no timers. The turn loop calls
//! [`SideEffectScheduler::poll`] when [`SideEffectScheduler::next_deadline`]
//! passes and [`SideEffectScheduler::on_unit`] on every tick of the queue.
//! Nothing happens while the scheduler is idle.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// The two visual states of the avatar's mouth
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouthState {
    /// Idle
    #[default]
    Closed,
    /// Speaking
    Open,
}

impl MouthState {
    /// The other state
    pub fn toggled(self) -> Self {
        match self {
            MouthState::Closed => MouthState::Open,
            MouthState::Open => MouthState::Closed,
        }
    }
}

/// Receives avatar state changes
pub trait AvatarSink {
    /// Show the given mouth state
    fn set_mouth(&mut self, state: MouthState);
}

/// Plays audio cues
pub trait AudioSink: Send + Sync {
    /// Start playing `cue`; must not block for the cue's duration
    fn play(&self, cue: &BeepCue);
}

/// Audio sink that drops every cue
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&self, _cue: &BeepCue) {}
}

/// A short square-wave beep with a decaying volume envelope
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeepCue {
    /// Oscillator frequency
    pub frequency_hz: f32,
    /// How long the cue lasts
    pub duration: Duration,
    /// Linear gain at the start of the cue
    pub volume: f32,
    /// Linear gain the envelope decays to
    pub volume_floor: f32,
}

impl Default for BeepCue {
    fn default() -> Self {
        Self {
            frequency_hz: 800.0,
            duration: Duration::from_millis(30),
            volume: 0.03,
            volume_floor: 0.001,
        }
    }
}

impl BeepCue {
    /// Whether the cue makes any sound
    pub fn is_audible(&self) -> bool {
        self.volume > 0.0 && !self.duration.is_zero()
    }

    /// Gain at `elapsed` into the cue, an exponential ramp from `volume` to
    /// `volume_floor`. Zero once the cue is over.
    pub fn gain_at(&self, elapsed: Duration) -> f32 {
        if !self.is_audible() || elapsed >= self.duration {
            return 0.0;
        }
        // An exponential ramp cannot reach zero
        let floor = self.volume_floor.max(f32::MIN_POSITIVE);
        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.volume * (floor / self.volume).powf(progress)
    }
}

/// Counters for one scheduler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectStats {
    /// Mouth toggles performed
    pub mouth_toggles: u64,
    /// Cues handed to the audio sink
    pub cues_played: u64,
    /// Cues skipped because the previous one was still playing
    pub cues_skipped: u64,
}

/// Mouth toggling and beep rate limiting for one turn
pub struct SideEffectScheduler {
    interval: Duration,
    cue: BeepCue,
    audio: Arc<dyn AudioSink>,
    speaking: bool,
    mouth: MouthState,
    next_toggle: Option<Instant>,
    cue_busy_until: Option<Instant>,
    stats: EffectStats,
}

impl std::fmt::Debug for SideEffectScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffectScheduler")
            .field("interval", &self.interval)
            .field("speaking", &self.speaking)
            .field("mouth", &self.mouth)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SideEffectScheduler {
    /// Create an idle scheduler
    pub fn new(interval: Duration, cue: BeepCue, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            interval,
            cue,
            audio,
            speaking: false,
            mouth: MouthState::Closed,
            next_toggle: None,
            cue_busy_until: None,
            stats: EffectStats::default(),
        }
    }

    /// Begin speaking; no-op if already speaking
    pub fn start(&mut self, now: Instant, avatar: &mut dyn AvatarSink) {
        if self.speaking {
            return;
        }
        self.speaking = true;
        self.set_mouth(MouthState::Open, avatar);
        self.next_toggle = Some(now + self.interval);
    }

    /// A unit was revealed: play a cue unless the previous one is still sounding
    pub fn on_unit(&mut self, now: Instant) {
        if !self.speaking || !self.cue.is_audible() {
            return;
        }
        if self.cue_busy_until.is_some_and(|until| now < until) {
            self.stats.cues_skipped += 1;
            return;
        }
        self.audio.play(&self.cue);
        self.cue_busy_until = Some(now + self.cue.duration);
        self.stats.cues_played += 1;
    }

    /// Toggle the mouth for every interval boundary that has passed
    pub fn poll(&mut self, now: Instant, avatar: &mut dyn AvatarSink) {
        if !self.speaking || self.interval.is_zero() {
            return;
        }
        let mut toggled = false;
        while let Some(due) = self.next_toggle.filter(|due| *due <= now) {
            self.mouth = self.mouth.toggled();
            self.stats.mouth_toggles += 1;
            self.next_toggle = Some(due + self.interval);
            toggled = true;
        }
        if toggled {
            avatar.set_mouth(self.mouth);
        }
    }

    /// Stop speaking and return the avatar to idle
    pub fn stop(&mut self, avatar: &mut dyn AvatarSink) {
        if !self.speaking {
            return;
        }
        self.speaking = false;
        self.next_toggle = None;
        self.set_mouth(MouthState::Closed, avatar);
    }

    /// When [`poll`](Self::poll) next has work; `None` while idle
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.speaking {
            self.next_toggle
        } else {
            None
        }
    }

    /// Whether the scheduler is active
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Current mouth state
    pub fn mouth(&self) -> MouthState {
        self.mouth
    }

    /// Counters so far
    pub fn stats(&self) -> EffectStats {
        self.stats
    }

    fn set_mouth(&mut self, state: MouthState, avatar: &mut dyn AvatarSink) {
        if self.mouth != state {
            self.stats.mouth_toggles += 1;
        }
        self.mouth = state;
        avatar.set_mouth(state);
    }
}
