//! Retroterm TUI Entry Point
//!
//! Usage:
//!   retroterm-tui [OPTIONS]
//!
//! Options:
//!   --server <URL>  Daemon base URL (default: http://127.0.0.1:8787, env RETROTERM_SERVER)
//!   --mute          Never ring the bell
//!
//! Logs go to `$XDG_STATE_HOME/retroterm/retroterm-tui.log` so they never
//! land on the alternate screen. Filter with `RUST_LOG`.

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use retroterm_tui::App;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "retroterm-tui", version, about)]
struct Args {
    /// Daemon base URL
    #[arg(long, env = "RETROTERM_SERVER", default_value = "http://127.0.0.1:8787")]
    server: String,

    /// Never ring the bell
    #[arg(long)]
    mute: bool,
}

fn log_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("retroterm")
        .join("retroterm-tui.log")
}

fn init_logging() -> anyhow::Result<PathBuf> {
    let path = log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {parent:?}"))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {path:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("retroterm_tui=info".parse()?)
                .add_directive("retroterm_core=info".parse()?),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: retroterm-tui requires a terminal (TTY)");
        std::process::exit(1);
    }

    let log_path = init_logging()?;
    tracing::info!(server = %args.server, log = ?log_path, "Starting Retroterm TUI");

    let mut app = App::new(&args.server, args.mute)?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal before printing panic
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Run the app
    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    tracing::info!("Retroterm TUI stopped");

    // Propagate any errors
    result
}
