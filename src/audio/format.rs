//! Session audio format

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, SAMPLE_SIZE};

/// Sample representation of incoming chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    F32,
}

impl SampleFormat {
    /// Size in bytes of a single sample
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::F32 => SAMPLE_SIZE,
        }
    }
}

/// Format of every buffer in a session. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: f64,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Mono, non-interleaved 32-bit float at the given rate
    pub fn mono_f32(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            channels: DEFAULT_CHANNELS,
            sample_format: SampleFormat::F32,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.size_bytes() * self.channels as usize
    }

    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate
    }

    /// Nearest whole frame for a time offset. Negative input maps to 0.
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate).round().max(0.0) as u64
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono_f32(DEFAULT_SAMPLE_RATE)
    }
}
