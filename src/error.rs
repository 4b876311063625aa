//! Error types for the PCM streaming player

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by streaming session operations
#[derive(Error, Debug)]
pub enum StreamError {
    /// Chunk could not be turned into a whole, non-empty run of f32 samples
    #[error("Malformed chunk: {len} bytes is not a positive multiple of the sample size")]
    MalformedChunk { len: usize },

    #[error("Invalid seek time {target}s (buffered duration is {total}s)")]
    InvalidSeekTime { target: f64, total: f64 },

    #[error("Playback start failed: {0}")]
    PlaybackStartFailed(#[source] DeviceError),
}

/// Output device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Device is not connected")]
    NotConnected,

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
