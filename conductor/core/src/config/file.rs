//! TOML Configuration File Support
//!
//! Configuration for the daemon, loaded from `retroterm.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The file lives at `$XDG_CONFIG_HOME/retroterm/retroterm.toml` (typically
//! `~/.config/retroterm/retroterm.toml`). A missing file is not an error.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8787"
//!
//! [generator]
//! host = "localhost"
//! port = 11434
//! model = "llama3.2"
//! system_prompt = "You are Misa, a friendly retro terminal."
//! timeout_secs = 120
//!
//! # Any field of the served UI document, camelCase as on the wire
//! [ui]
//! typeSpeed = 20
//! themeColor = "#ff66cc"
//!
//! [ui.nameTags]
//! user = "ME"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UiConfig;

/// Default listen address of the daemon
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default model asked for completions
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default persona prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Misa, a sweet and upbeat assistant living \
in a retro terminal. Keep replies short and friendly, and always answer in the language \
the user writes in.";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Listen address, `host:port`
    pub bind: Option<String>,
}

/// `[generator]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorToml {
    /// Ollama host
    pub host: Option<String>,
    /// Ollama port
    pub port: Option<u16>,
    /// Model name; an empty string leaves the generator unconfigured
    pub model: Option<String>,
    /// Persona prompt prepended to every request
    pub system_prompt: Option<String>,
    /// Upstream request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrotermToml {
    /// Server section
    pub server: ServerToml,
    /// Generator section
    pub generator: GeneratorToml,
    /// Served UI document; absent fields keep their defaults
    pub ui: Option<UiConfig>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved daemon configuration
#[derive(Clone, Debug)]
pub struct ServerConfigFile {
    /// Listen address
    pub bind: String,
    /// Ollama host
    pub ollama_host: String,
    /// Ollama port
    pub ollama_port: u16,
    /// Model name; empty means not configured
    pub model: String,
    /// Persona prompt
    pub system_prompt: String,
    /// Upstream request timeout
    pub request_timeout: Duration,
    /// Document served by the configuration endpoint
    pub ui: UiConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            ollama_host: "localhost".to_string(),
            ollama_port: 11434,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: Duration::from_secs(120),
            ui: UiConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ServerConfigFile {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The highest-priority layer that set a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Base URL of the Ollama server
    #[must_use]
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama_host, self.ollama_port)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the UI document would
    /// produce an invalid engine configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        super::EngineConfig::from_ui(&self.ui).map(|_| ())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/retroterm/retroterm.toml` or
/// `~/.config/retroterm/retroterm.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("retroterm").join("retroterm.toml"))
}

/// Load configuration from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
pub fn load_config() -> Result<ServerConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ServerConfigFile, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ServerConfigFile, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ServerConfigFile::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: RetrotermToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

fn apply_toml_config(config: &mut ServerConfigFile, toml: RetrotermToml) {
    if let Some(bind) = toml.server.bind {
        config.bind = bind;
    }

    if let Some(host) = toml.generator.host {
        config.ollama_host = host;
    }
    if let Some(port) = toml.generator.port {
        config.ollama_port = port;
    }
    if let Some(model) = toml.generator.model {
        config.model = model;
    }
    if let Some(prompt) = toml.generator.system_prompt {
        config.system_prompt = prompt;
    }
    if let Some(secs) = toml.generator.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    if let Some(ui) = toml.ui {
        config.ui = ui;
    }
}

fn apply_env_config<F>(config: &mut ServerConfigFile, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = env("RETROTERM_BIND") {
        config.bind = bind;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("RETROTERM_MODEL") {
        config.model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(prompt) = env("RETROTERM_SYSTEM_PROMPT") {
        config.system_prompt = prompt;
        config.source = ConfigSource::Env;
    }
    if let Some(host) = env("OLLAMA_HOST") {
        config.ollama_host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("OLLAMA_PORT") {
        match port.parse::<u16>() {
            Ok(port) => {
                config.ollama_port = port;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %port, "Ignoring invalid OLLAMA_PORT"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Listen address override
    pub bind: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Ollama host override
    pub ollama_host: Option<String>,
    /// Ollama port override
    pub ollama_port: Option<u16>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listen address override
    #[must_use]
    pub fn with_bind(mut self, bind: String) -> Self {
        self.bind = Some(bind);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set Ollama host override
    #[must_use]
    pub fn with_ollama_host(mut self, host: String) -> Self {
        self.ollama_host = Some(host);
        self
    }

    /// Set Ollama port override
    #[must_use]
    pub fn with_ollama_port(mut self, port: u16) -> Self {
        self.ollama_port = Some(port);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ServerConfigFile) {
        if self.bind.is_some()
            || self.model.is_some()
            || self.ollama_host.is_some()
            || self.ollama_port.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref bind) = self.bind {
            config.bind = bind.clone();
        }
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(ref host) = self.ollama_host {
            config.ollama_host = host.clone();
        }
        if let Some(port) = self.ollama_port {
            config.ollama_port = port;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
