//! Application configuration
//!
//! Loaded from TOML. Every section and field has a default, so a missing
//! file or a partial file is valid.
//!
//! ```toml
//! [audio]
//! sample_rate = 48000
//! channels = 1
//! buffer_duration_secs = 10
//!
//! [devices]
//! input = "input:USB Headset"
//! output = "output:USB Headset"
//!
//! [logging]
//! level = "debug"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::format::AudioFormat;
use crate::constants::*;
use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// How much audio a stream session may hold before evicting
    pub buffer_duration_secs: u64,
    /// Fixed device callback size in frames, device default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_buffer_frames: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            buffer_duration_secs: DEFAULT_BUFFER_DURATION_SECS,
            device_buffer_frames: None,
        }
    }
}

impl AudioConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    pub fn buffer_duration(&self) -> Duration {
        Duration::from_secs(self.buffer_duration_secs)
    }
}

/// Device IDs as reported by `list_devices`; `None` means system default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub devices: DeviceConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the platform config directory, falling back to defaults
    /// when no file exists there
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)
        };
        write().map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// `<config dir>/voice-stream-buffer/config.toml` for the current platform
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "voice", "voice-stream-buffer")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio
            .format()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.audio.buffer_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "buffer_duration_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
