//! Configuration
//!
//! Two layers live here:
//!
//! - [`ConfigDocument`] / [`UiConfig`]: the JSON document served by the
//!   configuration endpoint and fetched once by a surface at startup. Field
//!   names are camelCase on the wire.
//! - [`EngineConfig`]: the immutable snapshot the engine actually runs on,
//!   derived once from a [`UiConfig`] and passed by value into
//!   [`TurnSession::new`](crate::turn::TurnSession::new).
//!
//! File-based configuration for the daemon (TOML, environment, CLI) is in
//! [`file`].

pub mod file;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::effects::BeepCue;
use crate::scroll::ANCHOR_THRESHOLD;
use crate::typewriter::OverflowPolicy;

pub use file::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ConfigError,
    ConfigOverrides, ConfigSource, GeneratorToml, RetrotermToml, ServerConfigFile, ServerToml,
};

/// Substitution token in `systemMessages.banner1`
pub const FULL_NAME_TOKEN: &str = "{avatarFullName}";

/// Name used in banners when no name tag is configured
pub const FALLBACK_AGENT_NAME: &str = "AGENT";

// =============================================================================
// UI Document
// =============================================================================

/// Labels shown next to speakers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NameTags {
    /// Prefix of echoed user input
    pub user: String,
    /// Short avatar label
    pub avatar: String,
    /// Avatar name used in banners
    pub avatar_full_name: String,
}

impl Default for NameTags {
    fn default() -> Self {
        Self {
            user: "YOU".to_string(),
            avatar: "MISA".to_string(),
            avatar_full_name: "Misa AI".to_string(),
        }
    }
}

/// Banner lines shown once the surface is connected
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemMessages {
    /// First banner; supports the `{avatarFullName}` token
    pub banner1: String,
    /// Second banner
    pub banner2: String,
}

impl Default for SystemMessages {
    fn default() -> Self {
        Self {
            banner1: format!("SYSTEM {FULL_NAME_TOKEN} Online"),
            banner2: "Ready to chat~ (◕‿◕)".to_string(),
        }
    }
}

/// The `ui` object of the configuration document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiConfig {
    /// Accent for system and assistant text (hex)
    pub theme_color: String,
    /// Accent for user text (hex)
    pub user_color: String,
    /// Accent for tool output (hex)
    pub tool_color: String,
    /// Milliseconds per revealed character, fractions are rounded
    pub type_speed: f64,
    /// Panel opacity
    pub opacity: f64,
    /// Start gain of each beep
    pub sound_volume: f64,
    /// Milliseconds between mouth toggles, fractions are rounded
    pub mouth_interval: f64,
    /// Beep frequency in Hz
    pub beep_frequency: f64,
    /// Beep duration in seconds
    pub beep_duration: f64,
    /// Gain each beep decays to
    pub beep_volume_end: f64,
    /// Avatar overlay opacity
    pub avatar_overlay_opacity: f64,
    /// Avatar brightness multiplier
    pub avatar_brightness: f64,
    /// Text glow strength
    pub glow_text: f64,
    /// Box glow strength
    pub glow_box: f64,
    /// Global brightness multiplier
    pub brightness: f64,
    /// Speaker labels
    pub name_tags: NameTags,
    /// Startup banners
    pub system_messages: SystemMessages,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme_color: "#33ff99".to_string(),
            user_color: "#64ffff".to_string(),
            tool_color: "#ffaa00".to_string(),
            type_speed: 30.0,
            opacity: 0.85,
            sound_volume: 0.03,
            mouth_interval: 120.0,
            beep_frequency: 800.0,
            beep_duration: 0.03,
            beep_volume_end: 0.001,
            avatar_overlay_opacity: 0.15,
            avatar_brightness: 1.1,
            glow_text: 1.0,
            glow_box: 1.0,
            brightness: 1.0,
            name_tags: NameTags::default(),
            system_messages: SystemMessages::default(),
        }
    }
}

impl UiConfig {
    /// Name substituted into banners: full name, then short name, then `AGENT`
    pub fn display_name(&self) -> &str {
        [
            self.name_tags.avatar_full_name.as_str(),
            self.name_tags.avatar.as_str(),
        ]
        .into_iter()
        .find(|name| !name.is_empty())
        .unwrap_or(FALLBACK_AGENT_NAME)
    }

    /// Banner lines to show after connecting, `> `-prefixed, empty ones skipped
    pub fn banner_lines(&self) -> Vec<String> {
        let banner1 = self
            .system_messages
            .banner1
            .replacen(FULL_NAME_TOKEN, self.display_name(), 1);
        [banner1, self.system_messages.banner2.clone()]
            .into_iter()
            .filter(|banner| !banner.is_empty())
            .map(|banner| format!("> {banner}"))
            .collect()
    }

    /// Prefix for echoed user input
    pub fn user_tag(&self) -> String {
        if self.name_tags.user.is_empty() {
            "> ".to_string()
        } else {
            format!("{}> ", self.name_tags.user)
        }
    }

    /// The transcript line that echoes submitted input
    pub fn echo_line(&self, input: &str) -> String {
        format!("{}{input}", self.user_tag())
    }

    /// Accent colors, each falling back to the default when it does not parse
    pub fn accents(&self) -> Accents {
        let defaults = Accents::default();
        Accents {
            theme: Rgb::parse_hex(&self.theme_color).unwrap_or(defaults.theme),
            user: Rgb::parse_hex(&self.user_color).unwrap_or(defaults.user),
            tool: Rgb::parse_hex(&self.tool_color).unwrap_or(defaults.tool),
        }
    }
}

/// Full configuration document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Surface settings
    #[serde(default)]
    pub ui: UiConfig,
}

// =============================================================================
// Colors
// =============================================================================

/// An 8-bit RGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// Create a color
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`, case-insensitive
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Resolved accent colors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Accents {
    /// System and assistant text
    pub theme: Rgb,
    /// User text
    pub user: Rgb,
    /// Tool output
    pub tool: Rgb,
}

impl Default for Accents {
    fn default() -> Self {
        Self {
            theme: Rgb::new(0x33, 0xff, 0x99),
            user: Rgb::new(0x64, 0xff, 0xff),
            tool: Rgb::new(0xff, 0xaa, 0x00),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Immutable settings for one engine instance
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Time between revealed units
    pub cadence: Duration,
    /// Time between mouth toggles while speaking
    pub mouth_toggle_interval: Duration,
    /// Cue played per revealed unit
    pub beep: BeepCue,
    /// Auto-scroll anchor band, in viewport units
    pub scroll_threshold: f64,
    /// Optional FIFO cap
    pub queue_capacity: Option<usize>,
    /// What happens when the cap is reached
    pub overflow_policy: OverflowPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_millis(30),
            mouth_toggle_interval: Duration::from_millis(120),
            beep: BeepCue::default(),
            scroll_threshold: ANCHOR_THRESHOLD,
            queue_capacity: None,
            overflow_policy: OverflowPolicy::Unbounded,
        }
    }
}

/// Round a millisecond setting to a whole [`Duration`]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_millis(field: &str, ms: f64) -> Result<Duration, ConfigError> {
    if !(ms.is_finite() && ms >= 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be a non-negative number of milliseconds, got {ms}"
        )));
    }
    Ok(Duration::from_millis(ms.round() as u64))
}

impl EngineConfig {
    /// Derive engine settings from a fetched UI document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when a timing or audio value
    /// is out of range.
    pub fn from_ui(ui: &UiConfig) -> Result<Self, ConfigError> {
        if !(ui.beep_duration.is_finite() && ui.beep_duration >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "beepDuration must be a non-negative number of seconds, got {}",
                ui.beep_duration
            )));
        }
        let config = Self {
            cadence: whole_millis("typeSpeed", ui.type_speed)?,
            mouth_toggle_interval: whole_millis("mouthInterval", ui.mouth_interval)?,
            beep: BeepCue {
                frequency_hz: ui.beep_frequency as f32,
                duration: Duration::from_micros((ui.beep_duration * 1_000_000.0).round() as u64),
                volume: ui.sound_volume as f32,
                volume_floor: ui.beep_volume_end as f32,
            },
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mouth_toggle_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "mouthInterval must be greater than zero".to_string(),
            ));
        }
        let beep = &self.beep;
        if !(beep.volume.is_finite() && beep.volume >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "soundVolume must be non-negative, got {}",
                beep.volume
            )));
        }
        if !(beep.volume_floor.is_finite() && beep.volume_floor >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "beepVolumeEnd must be non-negative, got {}",
                beep.volume_floor
            )));
        }
        if !(beep.frequency_hz.is_finite() && beep.frequency_hz > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "beepFrequency must be positive, got {}",
                beep.frequency_hz
            )));
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ValidationError(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Same settings with audio silenced
    #[must_use]
    pub fn muted(mut self) -> Self {
        self.beep.volume = 0.0;
        self
    }

    /// Same settings with a capped FIFO
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.queue_capacity = Some(capacity);
        self.overflow_policy = policy;
        self
    }
}
