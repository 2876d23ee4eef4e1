//! Turn Session - The Orchestrator
//!
//! Drives one user submission from input to a finished assistant reply:
//!
//! ```text
//!  submit ──► SENDING ──► STREAMING ──┬──► COMPLETE ──┐
//!                │                    └──► ERRORED ───┼──► IDLE
//!                └── request failed ──────► ERRORED ──┘
//! ```
//!
//! # Design Philosophy
//!
//! A turn runs as a single async task. One `tokio::select!` loop multiplexes
//! network frames, typewriter ticks and mouth toggles, so decoder events are
//! handled in arrival order, ticks in schedule order, and nothing else touches
//! the per-turn queue or decoder. Both are created fresh for every turn and
//! dropped when it ends.
//!
//! Only one turn can be active. The guard is an atomic busy flag taken with
//! compare-exchange while holding the cancel lock, so the flag and the turn's
//! cancellation token change together. A submission that loses the race is
//! rejected without side effects. History and surface mutation go through
//! `parking_lot` mutexes that are never held across an `.await`.
//!
//! Nothing here is fatal. Every failure renders an inline notice and the
//! session returns to [`TurnState::Idle`] so the user can try again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::backend::{ByteStream, ChatBackend};
use crate::config::EngineConfig;
use crate::effects::{AudioSink, AvatarSink, SideEffectScheduler, SilentAudio};
use crate::render::{plain_text, LineKind, MarkdownRenderer, RenderSink};
use crate::scroll::{AutoScrollController, Viewport};
use crate::session::{ChatSession, Role, Turn};
use crate::stream::{DecoderStats, Frame, FrameStream};
use crate::typewriter::{Cadence, TypewriterQueue};

/// Inline notice shown when a turn is cancelled
pub const CANCELLED_NOTICE: &str = "Cancelled";

/// Everything a turn draws on
pub trait Surface: RenderSink + Viewport + AvatarSink + Send + 'static {}

impl<T> Surface for T where T: RenderSink + Viewport + AvatarSink + Send + 'static {}

/// Orchestrator state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnState {
    /// Ready for input
    #[default]
    Idle,
    /// Request issued, waiting for the response
    Sending,
    /// Response body is being revealed
    Streaming,
    /// Reply finished and committed
    Complete,
    /// Turn failed; a notice is on screen
    Errored,
}

impl TurnState {
    /// Whether a new submission would be accepted
    pub fn is_idle(&self) -> bool {
        matches!(self, TurnState::Idle)
    }
}

/// How a call to [`TurnSession::submit`] ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Reply revealed and committed to history
    Completed,
    /// Turn failed with the shown message
    Errored(String),
    /// Turn stopped by [`TurnSession::cancel`]
    Cancelled,
    /// Another turn was active; nothing happened
    Rejected,
    /// Input was blank; nothing happened
    Empty,
}

/// Counters across all turns of a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Submissions that started a turn
    pub turns_started: u64,
    /// Turns committed to history
    pub turns_completed: u64,
    /// Turns that ended in an error
    pub turns_errored: u64,
    /// Turns stopped by cancellation
    pub turns_cancelled: u64,
    /// Submissions refused because a turn was active
    pub submissions_rejected: u64,
    /// Units handed to the surface
    pub units_revealed: u64,
    /// Decoder counters summed over all turns
    pub decoder: DecoderStats,
}

enum Ending {
    Finished,
    Failed(String),
    Cancelled,
}

// ============================================================================
// Builder
// ============================================================================

/// Configures a [`TurnSession`]
pub struct TurnSessionBuilder<S: Surface> {
    backend: Arc<dyn ChatBackend>,
    surface: Arc<Mutex<S>>,
    config: EngineConfig,
    audio: Arc<dyn AudioSink>,
    markdown: MarkdownRenderer,
    user_tag: String,
}

impl<S: Surface> TurnSessionBuilder<S> {
    /// Engine settings
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Where beeps go; silent by default
    #[must_use]
    pub fn audio(mut self, audio: Arc<dyn AudioSink>) -> Self {
        self.audio = audio;
        self
    }

    /// Renderer applied to each finished reply; identity by default
    #[must_use]
    pub fn markdown(mut self, markdown: MarkdownRenderer) -> Self {
        self.markdown = markdown;
        self
    }

    /// Prefix of echoed user input, e.g. `"YOU> "`
    #[must_use]
    pub fn user_tag(mut self, tag: impl Into<String>) -> Self {
        self.user_tag = tag.into();
        self
    }

    /// Build the session
    pub fn build(self) -> TurnSession<S> {
        let (state_tx, _) = watch::channel(TurnState::Idle);
        TurnSession {
            inner: Arc::new(Inner {
                backend: self.backend,
                scroll: Mutex::new(AutoScrollController::new(self.config.scroll_threshold)),
                config: self.config,
                surface: self.surface,
                audio: self.audio,
                markdown: self.markdown,
                user_tag: self.user_tag,
                history: Mutex::new(ChatSession::new()),
                busy: AtomicBool::new(false),
                state_tx,
                cancel: Mutex::new(CancellationToken::new()),
                stats: Mutex::new(EngineStats::default()),
            }),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Handle to the orchestrator; clones share the same session
pub struct TurnSession<S: Surface> {
    inner: Arc<Inner<S>>,
}

impl<S: Surface> Clone for TurnSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: Surface> {
    backend: Arc<dyn ChatBackend>,
    config: EngineConfig,
    surface: Arc<Mutex<S>>,
    scroll: Mutex<AutoScrollController>,
    audio: Arc<dyn AudioSink>,
    markdown: MarkdownRenderer,
    user_tag: String,
    history: Mutex<ChatSession>,
    busy: AtomicBool,
    state_tx: watch::Sender<TurnState>,
    cancel: Mutex<CancellationToken>,
    stats: Mutex<EngineStats>,
}

/// Returns the session to idle when a turn ends, however it ends
struct BusyGuard<'a, S: Surface> {
    inner: &'a Inner<S>,
}

impl<S: Surface> Drop for BusyGuard<'_, S> {
    fn drop(&mut self) {
        // Publish idle before releasing the flag so a waiting submission's
        // state is never overwritten
        self.inner.set_state(TurnState::Idle);
        self.inner.busy.store(false, Ordering::Release);
    }
}

impl<S: Surface> TurnSession<S> {
    /// Create a session with default audio, markdown and user tag
    pub fn new(backend: Arc<dyn ChatBackend>, config: EngineConfig, surface: Arc<Mutex<S>>) -> Self {
        Self::builder(backend, surface).config(config).build()
    }

    /// Start configuring a session
    pub fn builder(backend: Arc<dyn ChatBackend>, surface: Arc<Mutex<S>>) -> TurnSessionBuilder<S> {
        TurnSessionBuilder {
            backend,
            surface,
            config: EngineConfig::default(),
            audio: Arc::new(SilentAudio),
            markdown: plain_text(),
            user_tag: "> ".to_string(),
        }
    }

    /// Run one turn for `input` to completion.
    ///
    /// Returns immediately with [`SubmitOutcome::Rejected`] if a turn is
    /// already active, or [`SubmitOutcome::Empty`] for blank input.
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        self.inner.submit(input).await
    }

    /// Stop the active turn, if any
    pub fn cancel(&self) {
        self.inner.cancel.lock().cancel();
    }

    /// The user moved the viewport
    pub fn on_user_scroll(&self) {
        let surface = self.inner.surface.lock();
        self.inner.scroll.lock().on_scroll(&*surface);
    }

    /// Whether appends currently follow the bottom
    pub fn is_anchored(&self) -> bool {
        self.inner.scroll.lock().is_anchored()
    }

    /// Current state
    pub fn state(&self) -> TurnState {
        *self.inner.state_tx.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether a turn is active
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the committed history
    pub fn history(&self) -> Vec<Turn> {
        self.inner.history.lock().turns().to_vec()
    }

    /// Counters so far
    pub fn stats(&self) -> EngineStats {
        *self.inner.stats.lock()
    }

    /// Engine settings in use
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The shared surface
    pub fn surface(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.inner.surface)
    }
}

impl<S: Surface> Inner<S> {
    async fn submit(&self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Empty;
        }

        // The busy flag and the turn's token change together under the cancel lock
        let token = {
            let mut slot = self.cancel.lock();
            if self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                drop(slot);
                self.stats.lock().submissions_rejected += 1;
                tracing::debug!("Ignoring submission while a turn is active");
                return SubmitOutcome::Rejected;
            }
            let token = CancellationToken::new();
            *slot = token.clone();
            token
        };
        let _guard = BusyGuard { inner: self };

        self.stats.lock().turns_started += 1;

        // SENDING: the user turn is history from here on, whatever follows
        self.set_state(TurnState::Sending);
        let messages = {
            let mut history = self.history.lock();
            history.commit(Turn::user(text));
            history.to_messages()
        };
        self.append_line(LineKind::User, &format!("{}{text}", self.user_tag));

        tracing::info!(messages = messages.len(), "Submitting turn");

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.backend.open(&messages) => Some(result),
        };

        match opened {
            Some(Ok(body)) => self.stream(body, &token).await,
            Some(Err(e)) => {
                let message = e.user_message();
                tracing::warn!(error = %e, "Chat request failed");
                self.append_line(LineKind::Error, &format!("Error: {message}"));
                self.stats.lock().turns_errored += 1;
                self.set_state(TurnState::Errored);
                SubmitOutcome::Errored(message)
            }
            None => {
                tracing::info!("Turn cancelled before the response arrived");
                self.append_line(LineKind::System, CANCELLED_NOTICE);
                self.stats.lock().turns_cancelled += 1;
                SubmitOutcome::Cancelled
            }
        }
    }

    async fn stream(&self, body: ByteStream, token: &CancellationToken) -> SubmitOutcome {
        let mut frames = FrameStream::new(body);
        let mut queue = match self.config.queue_capacity {
            Some(capacity) => TypewriterQueue::with_capacity(capacity, self.config.overflow_policy),
            None => TypewriterQueue::new(),
        };
        let mut cadence = Cadence::new(self.config.cadence);
        let mut effects = SideEffectScheduler::new(
            self.config.mouth_toggle_interval,
            self.config.beep,
            Arc::clone(&self.audio),
        );
        let mut turn = Turn::pending(Role::Assistant);
        let mut input_open = true;
        let mut began = false;

        self.set_state(TurnState::Streaming);
        tracing::debug!(turn = %turn.id, "Streaming reply");

        let ending = loop {
            if queue.take_finished() {
                break Ending::Finished;
            }

            let now = Instant::now();
            let emit_at = cadence.deadline(now);
            let toggle_at = effects.next_deadline();

            tokio::select! {
                biased;
                _ = token.cancelled() => break Ending::Cancelled,
                _ = sleep_until(emit_at), if queue.is_speaking() => {
                    self.reveal(&mut queue, &mut cadence, &mut effects, &mut began);
                }
                _ = sleep_until(toggle_at.unwrap_or(now)), if toggle_at.is_some() => {
                    effects.poll(Instant::now(), &mut *self.surface.lock());
                }
                frame = frames.next(), if input_open => match frame {
                    Some(Frame::Text(text)) => {
                        turn.append(&text);
                        queue.enqueue(&text);
                    }
                    Some(Frame::Done) => {
                        input_open = false;
                        queue.mark_end_of_stream();
                    }
                    Some(Frame::Error(message)) => break Ending::Failed(message),
                    None => {
                        tracing::warn!(turn = %turn.id, "Stream ended without done sentinel");
                        input_open = false;
                        queue.mark_end_of_stream();
                    }
                },
                else => break Ending::Finished,
            }
        };

        let decoder_stats = frames.stats();
        drop(frames);
        self.stats.lock().decoder.merge(&decoder_stats);
        if decoder_stats.dropped_frames > 0 {
            tracing::debug!(
                dropped = decoder_stats.dropped_frames,
                "Turn had malformed frames"
            );
        }

        match ending {
            Ending::Finished => {
                turn.complete();
                let markup = (self.markdown)(&turn.content);
                {
                    let mut surface = self.surface.lock();
                    effects.stop(&mut *surface);
                    if !began {
                        surface.begin_message(LineKind::Assistant);
                    }
                    surface.complete_message(&markup);
                    self.scroll.lock().after_append(&mut *surface);
                }
                tracing::info!(
                    turn = %turn.id,
                    chars = turn.content.chars().count(),
                    "Turn complete"
                );
                self.history.lock().commit(turn);
                self.stats.lock().turns_completed += 1;
                self.set_state(TurnState::Complete);
                SubmitOutcome::Completed
            }
            Ending::Failed(message) => {
                self.flush(&mut queue, &mut effects, &mut began);
                turn.fail();
                tracing::warn!(
                    turn = %turn.id,
                    error = %message,
                    discarded = turn.content.len(),
                    "Turn failed mid-stream"
                );
                self.append_line(LineKind::Error, &format!("Error: {message}"));
                self.stats.lock().turns_errored += 1;
                self.set_state(TurnState::Errored);
                SubmitOutcome::Errored(message)
            }
            Ending::Cancelled => {
                self.flush(&mut queue, &mut effects, &mut began);
                turn.fail();
                tracing::info!(turn = %turn.id, "Turn cancelled");
                self.append_line(LineKind::System, CANCELLED_NOTICE);
                self.stats.lock().turns_cancelled += 1;
                SubmitOutcome::Cancelled
            }
        }
    }

    /// One typewriter tick
    fn reveal(
        &self,
        queue: &mut TypewriterQueue,
        cadence: &mut Cadence,
        effects: &mut SideEffectScheduler,
        began: &mut bool,
    ) {
        let Some(unit) = queue.next_unit() else {
            return;
        };
        let now = Instant::now();
        cadence.fired(now);

        {
            let mut surface = self.surface.lock();
            if !*began {
                surface.begin_message(LineKind::Assistant);
                *began = true;
            }
            effects.start(now, &mut *surface);
            surface.push_unit(&unit);
            self.scroll.lock().after_append(&mut *surface);
            effects.on_unit(now);
            if queue.is_empty() {
                effects.stop(&mut *surface);
            }
        }
        self.stats.lock().units_revealed += 1;
    }

    /// Reveal everything still buffered at once and go quiet
    fn flush(&self, queue: &mut TypewriterQueue, effects: &mut SideEffectScheduler, began: &mut bool) {
        let units = queue.flush_immediately();
        {
            let mut surface = self.surface.lock();
            if !units.is_empty() && !*began {
                surface.begin_message(LineKind::Assistant);
                *began = true;
            }
            for unit in &units {
                surface.push_unit(unit);
            }
            effects.stop(&mut *surface);
            self.scroll.lock().after_append(&mut *surface);
        }
        self.stats.lock().units_revealed += units.len() as u64;
    }

    fn append_line(&self, kind: LineKind, text: &str) {
        let mut surface = self.surface.lock();
        surface.append_line(kind, text);
        self.scroll.lock().after_append(&mut *surface);
    }

    fn set_state(&self, state: TurnState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Turn state changed");
        }
    }
}
