//! Retroterm Daemon
//!
//! Serves the streaming chat endpoint and the UI configuration document for
//! retroterm surfaces, backed by a local Ollama server.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default address (127.0.0.1:8787)
//! retroterm-daemon
//!
//! # Different model and address
//! retroterm-daemon --model qwen2.5 --bind 0.0.0.0:9000
//!
//! # With verbose logging
//! RUST_LOG=debug retroterm-daemon
//! ```
//!
//! # Environment Variables
//!
//! - `RETROTERM_CONFIG`: Config file path
//! - `RETROTERM_BIND`: Listen address (default: 127.0.0.1:8787)
//! - `RETROTERM_MODEL`: Ollama model name (default: llama3.2)
//! - `RETROTERM_SYSTEM_PROMPT`: Persona prompt sent before the history
//! - `OLLAMA_HOST`: Ollama server host (default: localhost)
//! - `OLLAMA_PORT`: Ollama server port (default: 11434)
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Files
//!
//! - Config: `$XDG_CONFIG_HOME/retroterm/retroterm.toml`
//!
//! # Signals
//!
//! - SIGTERM/SIGINT: Graceful shutdown (in-flight replies finish first)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use retroterm_core::config::{default_config_path, load_config_from_path};
use retroterm_core::{ConfigOverrides, Generator, OllamaConfig, OllamaGenerator};
use retroterm_daemon::{serve, AppState};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "retroterm-daemon", version, about)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/retroterm/retroterm.toml)
    #[arg(long, env = "RETROTERM_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// Ollama model name
    #[arg(long)]
    model: Option<String>,

    /// Ollama server host
    #[arg(long)]
    ollama_host: Option<String>,

    /// Ollama server port
    #[arg(long)]
    ollama_port: Option<u16>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(bind) = &self.bind {
            overrides = overrides.with_bind(bind.clone());
        }
        if let Some(model) = &self.model {
            overrides = overrides.with_model(model.clone());
        }
        if let Some(host) = &self.ollama_host {
            overrides = overrides.with_ollama_host(host.clone());
        }
        if let Some(port) = self.ollama_port {
            overrides = overrides.with_ollama_port(port);
        }
        overrides
    }
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("retroterm_daemon=info".parse()?)
                .add_directive("retroterm_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("Starting Retroterm Daemon");

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config =
        load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        path = ?config.config_file_path,
        model = %config.model,
        ollama = %config.ollama_url(),
        "Configuration loaded"
    );

    let generator = OllamaGenerator::new(OllamaConfig::from_server_config(&config))
        .context("Failed to create Ollama client")?;
    if let Err(e) = generator.check_configured() {
        warn!(error = %e, "Generator is not configured, chat requests will fail");
    }

    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    let state = AppState::new(Arc::new(generator), config.ui.clone());
    serve(listener, state, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Retroterm Daemon stopped");
    Ok(())
}
