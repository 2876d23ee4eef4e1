//! Main Application
//!
//! The App struct manages the TUI lifecycle:
//! - Startup: show the connecting notice, fetch the UI document once
//! - Event loop (keyboard, mouse, resize) multiplexed with a frame tick
//! - Submitting input to the [`TurnSession`], which runs each turn as its
//!   own task and writes into the shared [`Screen`]
//! - Drawing the transcript, avatar, input line and status bar
//!
//! The app never blocks on a turn. Rendering reads whatever the engine has
//! revealed so far.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use futures::StreamExt;
use parking_lot::Mutex;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::{Frame, Terminal};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthChar;

use retroterm_core::render::{show_banners, show_connect_failed, show_connecting};
use retroterm_core::{
    AudioSink, BackendError, ChatBackend, ConfigDocument, EngineConfig, HttpChatBackend,
    SilentAudio, TurnSession, TurnState, UiConfig, Viewport,
};

use crate::audio::TerminalBell;
use crate::avatar::Avatar;
use crate::markdown;
use crate::screen::{Screen, ANCHOR_ROWS};
use crate::theme::{Theme, CRT_BLACK, DIM_GRAY};

/// Redraw interval
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Width of the avatar column
const AVATAR_PANEL_WIDTH: u16 = 13;

/// Rows moved per mouse wheel notch
const WHEEL_ROWS: isize = 3;

/// Where the app is in its startup sequence
enum Phase {
    /// Fetching the UI document, input disabled
    Connecting,
    /// Config applied, input enabled
    Ready(TurnSession<Screen>),
    /// Config fetch failed, input stays disabled
    Offline,
}

/// Screen regions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppLayout {
    /// Transcript
    pub transcript: Rect,
    /// Avatar column
    pub avatar: Rect,
    /// Rule above the input line
    pub separator: Rect,
    /// Input line
    pub input: Rect,
    /// Status bar
    pub status: Rect,
}

impl AppLayout {
    /// Split the terminal area
    pub fn new(area: Rect) -> Self {
        let [body, separator, input, status] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);
        let [transcript, avatar] =
            Layout::horizontal([Constraint::Min(1), Constraint::Length(AVATAR_PANEL_WIDTH)])
                .areas(body);

        Self {
            transcript,
            avatar,
            separator,
            input,
            status,
        }
    }
}

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    phase: Phase,

    // === Engine Integration ===
    backend: Arc<HttpChatBackend>,
    /// Shared with the engine, which writes into it from turn tasks
    screen: Arc<Mutex<Screen>>,
    mute: bool,

    // === Presentation ===
    theme: Theme,
    avatar: Avatar,
    user_tag: String,

    // === Input State ===
    input: String,
}

impl App {
    /// Create an app talking to the daemon at `server`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server: &str, mute: bool) -> anyhow::Result<Self> {
        let backend = Arc::new(HttpChatBackend::new(server)?);
        let theme = Theme::default();
        Ok(Self {
            running: true,
            phase: Phase::Connecting,
            backend,
            screen: Arc::new(Mutex::new(Screen::new(80, 20))),
            mute,
            avatar: Avatar::new(&theme),
            theme,
            user_tag: UiConfig::default().user_tag(),
            input: String::new(),
        })
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        let mut tick = tokio::time::interval(FRAME_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        show_connecting(&mut *self.screen.lock());
        let backend = Arc::clone(&self.backend);
        let startup = async move { backend.fetch_config().await };
        tokio::pin!(startup);
        let mut connecting = true;

        // Render initial frame immediately so user sees UI
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Terminal events - highest priority
                maybe_event = event_stream.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => warn!(error = %e, "Terminal event error"),
                    None => self.running = false,
                },

                result = &mut startup, if connecting => {
                    connecting = false;
                    self.on_config(result);
                }

                _ = tick.tick() => {}
            }

            self.render(terminal)?;
        }

        if let Phase::Ready(session) = &self.phase {
            session.cancel();
        }
        Ok(())
    }

    /// Apply the result of the startup config fetch
    pub fn on_config(&mut self, result: Result<ConfigDocument, BackendError>) {
        match result {
            Ok(document) => self.apply_config(&document.ui),
            Err(e) => {
                warn!(error = %e, server = self.backend.base_url(), "Failed to fetch config");
                show_connect_failed(&mut *self.screen.lock());
                self.phase = Phase::Offline;
            }
        }
    }

    fn apply_config(&mut self, ui: &UiConfig) {
        let mut config = EngineConfig::from_ui(ui).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid engine settings, using defaults");
            EngineConfig::default()
        });
        config.scroll_threshold = ANCHOR_ROWS;

        let audio: Arc<dyn AudioSink> = if self.mute {
            config = config.muted();
            Arc::new(SilentAudio)
        } else {
            Arc::new(TerminalBell::new())
        };

        self.theme = Theme::from_accents(ui.accents());
        self.avatar = Avatar::new(&self.theme);
        self.user_tag = ui.user_tag();

        let backend: Arc<dyn ChatBackend> = self.backend.clone();
        let session = TurnSession::builder(backend, Arc::clone(&self.screen))
            .config(config)
            .audio(audio)
            .markdown(markdown::renderer())
            .user_tag(ui.user_tag())
            .build();

        show_banners(&mut *self.screen.lock(), ui);
        info!(name = ui.display_name(), "Connected");
        self.phase = Phase::Ready(session);
    }

    // ========================================================================
    // Input
    // ========================================================================

    fn handle_event(&mut self, event: Event) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            // Layout is recomputed on every draw
            _ => {}
        }
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
            }
            // Esc cancels an active turn, otherwise quits
            KeyCode::Esc => match &self.phase {
                Phase::Ready(session) if session.is_busy() => session.cancel(),
                _ => self.running = false,
            },

            KeyCode::Enter => self.submit(),
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }

            KeyCode::PageUp => self.scroll(-self.page_rows()),
            KeyCode::PageDown => self.scroll(self.page_rows()),
            KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll(isize::MAX / 2);
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll(-WHEEL_ROWS),
            MouseEventKind::ScrollDown => self.scroll(WHEEL_ROWS),
            _ => {}
        }
    }

    /// Hand the input line to the engine
    fn submit(&mut self) {
        let Phase::Ready(session) = &self.phase else {
            return;
        };
        if session.is_busy() || self.input.trim().is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.input);
        let session = session.clone();
        tokio::spawn(async move {
            let outcome = session.submit(&text).await;
            debug!(?outcome, "Turn finished");
        });
    }

    fn scroll(&mut self, delta: isize) {
        self.screen.lock().scroll_by(delta);
        if let Phase::Ready(session) = &self.phase {
            session.on_user_scroll();
        }
    }

    fn page_rows(&self) -> isize {
        let rows = Viewport::client_height(&*self.screen.lock()) / 2.0;
        #[allow(clippy::cast_possible_truncation)]
        let rows = rows.max(1.0) as isize;
        rows
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Whether the app is still running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current input line contents
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Whether input is accepted
    pub fn input_enabled(&self) -> bool {
        matches!(self.phase, Phase::Ready(_))
    }

    /// Shared transcript
    pub fn screen(&self) -> Arc<Mutex<Screen>> {
        Arc::clone(&self.screen)
    }

    fn status_label(&self) -> &'static str {
        match &self.phase {
            Phase::Connecting => "Connecting...",
            Phase::Offline => "Offline",
            Phase::Ready(session) => match session.state() {
                TurnState::Sending => "Sending...",
                TurnState::Streaming => "Typing...",
                TurnState::Idle | TurnState::Complete | TurnState::Errored => "Ready",
            },
        }
    }

    /// Draw one frame
    pub fn render<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        terminal.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let layout = AppLayout::new(frame.area());
        let area = frame.area();
        frame.buffer_mut().set_style(area, Style::default().bg(CRT_BLACK));
        let anchored = match &self.phase {
            Phase::Ready(session) => session.is_anchored(),
            _ => true,
        };

        let (mouth, rows_below) = {
            let mut screen = self.screen.lock();
            screen.resize(layout.transcript.width, layout.transcript.height);
            if anchored {
                screen.scroll_to_bottom();
            }
            screen.render(&self.theme, layout.transcript, frame.buffer_mut());
            (screen.mouth(), screen.rows_below())
        };

        let buf = frame.buffer_mut();
        self.avatar.render(mouth, layout.avatar, buf);

        let rule = "─".repeat(usize::from(layout.separator.width));
        buf.set_string(
            layout.separator.x,
            layout.separator.y,
            rule,
            Style::default().fg(DIM_GRAY),
        );

        let (input_line, input_style) = self.input_line();
        buf.set_stringn(
            layout.input.x,
            layout.input.y,
            tail_fitting(&input_line, usize::from(layout.input.width)),
            usize::from(layout.input.width),
            input_style,
        );

        let status = status_text(self.status_label(), rows_below);
        buf.set_stringn(
            layout.status.x,
            layout.status.y,
            status,
            usize::from(layout.status.width),
            Style::default().fg(self.theme.tool),
        );
    }

    fn input_line(&self) -> (String, Style) {
        match &self.phase {
            Phase::Ready(session) => {
                let style = Style::default().fg(self.theme.user);
                let line = format!("{}{}_", self.user_tag, self.input);
                if session.is_busy() {
                    (line, style.add_modifier(Modifier::DIM))
                } else {
                    (line, style)
                }
            }
            Phase::Connecting | Phase::Offline => {
                (String::new(), Style::default().fg(DIM_GRAY))
            }
        }
    }
}

/// The longest suffix of `line` that fits in `width` columns
pub fn tail_fitting(line: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in line.char_indices().rev() {
        used += ch.width().unwrap_or(0);
        if used > width {
            return &line[idx + ch.len_utf8()..];
        }
    }
    line
}

/// Status bar contents
pub fn status_text(label: &str, rows_below: usize) -> String {
    let more = if rows_below > 0 {
        format!(" [{rows_below} more below]")
    } else {
        String::new()
    };
    format!(" {label} | Enter send | Esc cancel/quit | PgUp/PgDn scroll{more}")
}
