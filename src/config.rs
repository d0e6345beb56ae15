use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default player executable (PipeWire)
pub const DEFAULT_PLAYER: &str = "pw-play";

/// Longest allowed interrupt grace period; stopping blocks the control loop
pub const MAX_STOP_TIMEOUT_MS: u64 = 1000;

/// Application configuration, persisted as TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playback routing and volumes
    pub playback: PlaybackConfig,
    /// Device enumeration settings
    pub devices: DevicesConfig,
    /// Global hotkey settings
    pub hotkeys: HotkeysConfig,
    /// Logging settings
    pub telemetry: TelemetryConfig,
    /// Sound list, in display order
    pub sounds: Vec<Sound>,
}

/// A playable clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    /// Absolute path to the audio file
    pub file: PathBuf,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Hotkey string as entered by the user (e.g. `F1`, `A`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
}

impl Sound {
    /// Creates an unbound sound named after the file stem
    #[must_use]
    pub fn from_file(file: PathBuf) -> Self {
        let name = file
            .file_stem()
            .map_or_else(|| "Unknown".to_owned(), |s| s.to_string_lossy().into_owned());
        Self {
            file,
            name,
            hotkey: None,
        }
    }

    /// Hotkey string if set and non-blank
    #[must_use]
    pub fn hotkey(&self) -> Option<&str> {
        self.hotkey.as_deref().filter(|h| !h.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Target device raw name; empty means not configured
    pub target: String,
    /// Target (microphone) stream volume, percent
    #[serde(deserialize_with = "percent")]
    pub mic_volume: u8,
    /// Local monitor volume, percent; 0 disables the monitor stream
    #[serde(deserialize_with = "percent")]
    pub local_volume: u8,
    /// Player executable
    pub player: String,
    /// Grace period after the interrupt signal before killing a player
    pub stop_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            mic_volume: 100,
            local_volume: 50,
            player: DEFAULT_PLAYER.to_owned(),
            stop_timeout_ms: 100,
        }
    }
}

impl PlaybackConfig {
    /// Configured target, `None` when blank
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        let target = self.target.trim();
        (!target.is_empty()).then_some(target)
    }

    /// Grace period as a `Duration`
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Per-query timeout
    pub query_timeout_secs: u64,
    /// `pactl` executable
    pub pactl: String,
    /// `pw-link` executable
    pub pw_link: String,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 5,
            pactl: "pactl".to_owned(),
            pw_link: "pw-link".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeysConfig {
    /// Start the global listener with `run`
    pub enabled: bool,
    /// Capacity of the listener → control hand-off queue
    pub channel_capacity: usize,
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub log_path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: "~/.linuxpad/linuxpad.log".to_owned(),
        }
    }
}

impl Config {
    /// Load config from ~/.linuxpad.toml, creating it with defaults if missing
    ///
    /// # Errors
    /// Returns error if HOME is unset or the file cannot be read, written or parsed
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from an explicit path, creating it with defaults if missing
    ///
    /// # Errors
    /// Returns error if the file cannot be read, written or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::default()
                .save_to(path)
                .context("failed to create default config")?;
        }

        let contents = fs::read_to_string(path).context("failed to read config file")?;
        Self::parse(&contents)
    }

    /// Read config without ever writing it
    ///
    /// Returns `None` when the file is missing or blank, as happens while an
    /// editor is replacing it.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("failed to read config file"),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Self::parse(&contents).map(Some)
    }

    /// Write config to an explicit path, creating parent directories
    ///
    /// # Errors
    /// Returns error if serialization or the write fails
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents).context("failed to write config file")?;
        Ok(())
    }

    /// Default config location
    ///
    /// # Errors
    /// Returns error if HOME is unset
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".linuxpad.toml"))
    }

    /// Expand ~ in paths to home directory
    ///
    /// # Errors
    /// Returns error if the path starts with `~/` and HOME is unset
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents).context("failed to parse config TOML")?;
        config.clamp_limits();
        Ok(config)
    }

    fn clamp_limits(&mut self) {
        if self.playback.stop_timeout_ms > MAX_STOP_TIMEOUT_MS {
            tracing::warn!(
                value = self.playback.stop_timeout_ms,
                max = MAX_STOP_TIMEOUT_MS,
                "stop timeout too long, clamping"
            );
            self.playback.stop_timeout_ms = MAX_STOP_TIMEOUT_MS;
        }
    }
}

// Accepts any integer and clamps it into 0..=100
fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = i64::deserialize(deserializer)?;
    let clamped = value.clamp(0, 100);
    if clamped != value {
        tracing::warn!(value, "volume outside 0-100%, clamping");
    }
    u8::try_from(clamped).map_err(serde::de::Error::custom)
}
