//! # PCM Stream Player
//!
//! Streams successive chunks of raw mono f32 PCM into a continuously playing
//! output, with pause, full reset and frame-accurate seek within the audio
//! received so far.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                        CONTROL CONTEXT                                │
//! │   raw chunks ──► ┌──────────────────────────────────────────────┐     │
//! │                  │        StreamingSession (session)            │     │
//! │   seek/pause ──► │  ┌──────────────┐      ┌──────────────────┐  │     │
//! │                  │  │ BufferQueue  │─────►│   Seek Engine    │  │     │
//! │                  │  │ (SampleBuf…) │      │ (locate + split) │  │     │
//! │                  │  └──────┬───────┘      └────────┬─────────┘  │     │
//! │                  │         │ schedule(buf, gen)    │ reschedule │     │
//! │                  └─────────┼───────────────────────┼────────────┘     │
//! │                            ▼                       ▼                  │
//! │                  ┌──────────────────────────────────────────────┐     │
//! │                  │     OutputDevice (audio::device)             │     │
//! │                  │  connect / schedule / play / pause / stop    │     │
//! │                  └─────────────────────┬────────────────────────┘     │
//! └────────────────────────────────────────┼──────────────────────────────┘
//!                                          │ completions, schedule order
//!                                          ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                      RENDERING CONTEXT                                │
//! │            PlaybackClock::advance(generation, seconds)                │
//! │       (stale generations are ignored after seek / reset)              │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod session;

pub use error::{Error, Result};
pub use session::{PlaybackState, SessionStats, StreamingSession};

/// Application-wide constants
pub mod constants {
    /// Sample rate of the input chunk format
    pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

    /// Input chunks are always mono
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Size of one f32 sample in bytes
    pub const SAMPLE_SIZE: usize = std::mem::size_of::<f32>();

    /// Default chunk size read by the player binary (100 ms at 44.1 kHz)
    pub const DEFAULT_CHUNK_BYTES: usize = 4410 * SAMPLE_SIZE;

    /// Default TCP port for incoming PCM streams
    pub const DEFAULT_TCP_PORT: u16 = 7878;

    /// Capacity of the device completion channel
    pub const COMPLETION_CHANNEL_CAPACITY: usize = 1024;
}
