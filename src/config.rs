//! Application configuration
//!
//! Loaded from TOML. Every section has built-in defaults, so an empty or
//! missing file yields a working setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::format::AudioFormat;
use crate::constants::{DEFAULT_CHUNK_BYTES, DEFAULT_SAMPLE_RATE, DEFAULT_TCP_PORT, SAMPLE_SIZE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub stream: StreamConfig,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: f64,
    /// Output device name; the system default when unset
    pub device: Option<String>,
    /// Fixed device buffer size in frames
    pub buffer_size: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            device: None,
            buffer_size: None,
        }
    }
}

/// Incoming stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes per chunk handed to the session
    pub chunk_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

/// Where PCM streams are accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub bind_address: String,
    pub tcp_port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            tcp_port: DEFAULT_TCP_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load `config.toml` from the platform config directory, or fall back
    /// to defaults if there is none
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pcm-stream-player")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.audio.sample_rate.is_finite() && self.audio.sample_rate > 0.0) {
            return Err(Error::Config(format!(
                "sample_rate must be positive, got {}",
                self.audio.sample_rate
            )));
        }
        if self.stream.chunk_bytes == 0 || self.stream.chunk_bytes % SAMPLE_SIZE != 0 {
            return Err(Error::Config(format!(
                "chunk_bytes must be a positive multiple of {}, got {}",
                SAMPLE_SIZE, self.stream.chunk_bytes
            )));
        }
        Ok(())
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::mono_f32(self.audio.sample_rate)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.control.bind_address, self.control.tcp_port)
    }
}
