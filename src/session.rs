//! Streaming session
//!
//! Owns the buffer queue and playback clock for one logical stream at a
//! time and drives an injected [`OutputDevice`]. Public operations are
//! called from a single control context and never block on playback; the
//! device reports finished buffers from its own context through the clock.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audio::buffer::{BufferQueue, SampleBuffer};
use crate::audio::clock::{PlaybackClock, SharedClock};
use crate::audio::device::OutputDevice;
use crate::audio::format::AudioFormat;
use crate::audio::seek;
use crate::error::{DeviceError, StreamError};

/// Session playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Session statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub state: PlaybackState,
    pub buffers: usize,
    pub buffered_seconds: f64,
    pub position_seconds: f64,
    pub chunks_accepted: u64,
    pub chunks_dropped: u64,
    pub seeks: u64,
    pub stale_completions: u64,
}

/// Wall-clock milliseconds since the Unix epoch
pub fn timestamp_ms() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1000.0
}

pub struct StreamingSession {
    device: Arc<dyn OutputDevice>,
    format: AudioFormat,
    queue: BufferQueue,
    clock: SharedClock,
    state: PlaybackState,
    chunks_accepted: u64,
    chunks_dropped: u64,
    seeks: u64,
}

impl StreamingSession {
    /// Create a session and connect the device for `format`
    pub fn new(device: Arc<dyn OutputDevice>, format: AudioFormat) -> Result<Self, DeviceError> {
        device.connect(&format)?;
        info!(sample_rate = format.sample_rate, "Streaming session ready");

        Ok(Self {
            device,
            format,
            queue: BufferQueue::new(),
            clock: Arc::new(PlaybackClock::new()),
            state: PlaybackState::Idle,
            chunks_accepted: 0,
            chunks_dropped: 0,
            seeks: 0,
        })
    }

    /// Queue a chunk of raw f32 samples for playback.
    ///
    /// `is_first` starts a new logical stream: everything from the previous
    /// one is discarded and the device is started once the chunk is queued.
    /// Malformed chunks are logged and dropped. Returns the wall-clock time
    /// (ms) at which playback was started, or at which the chunk was
    /// scheduled for non-first chunks.
    pub fn ingest(&mut self, chunk: &[u8], is_first: bool) -> f64 {
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_secs_f64() * 1000.0;

        if is_first {
            self.stop_and_clear();
        }

        let buffer = match SampleBuffer::from_bytes(chunk) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.chunks_dropped += 1;
                warn!(elapsed_ms = elapsed_ms(), "Dropping chunk: {}", e);
                return timestamp_ms();
            }
        };

        let frames = buffer.frame_count();
        let index = self.queue.push(buffer.clone());
        self.chunks_accepted += 1;
        if let Err(e) = self.schedule(buffer, self.queue.total_frames()) {
            warn!(index, "Failed to schedule buffer: {}", e);
        }
        debug!(index, frames, total = self.total_duration(), "Chunk queued");

        let mut started_at = timestamp_ms();
        if is_first {
            match self.device.play() {
                Ok(()) => {
                    started_at = timestamp_ms();
                    self.state = PlaybackState::Playing;
                    info!(elapsed_ms = elapsed_ms(), "Playback started");
                }
                Err(e) => {
                    error!(elapsed_ms = elapsed_ms(), "Error starting output: {}", e);
                }
            }
        }

        started_at
    }

    /// Jump to `target` seconds within the audio received so far.
    ///
    /// Returns the wall-clock time (ms) at which playback resumed. An out of
    /// range target changes nothing. If the device refuses to start, the new
    /// schedule and position are kept so [`resume`](Self::resume) can retry.
    pub fn seek_to(&mut self, target: f64) -> Result<f64, StreamError> {
        let plan = seek::plan(&self.queue, &self.format, target)?;

        self.device.stop();
        self.device.reset();

        // Handlers scheduled from here on belong to the new generation
        let generation = self.clock.reset_to(target);
        for planned in plan.buffers {
            if let Err(e) = self.schedule(planned.buffer, planned.end_frame) {
                warn!(generation, "Failed to reschedule buffer: {}", e);
            }
        }
        self.seeks += 1;
        debug!(
            target,
            buffer_index = plan.point.buffer_index,
            frame_offset = plan.point.frame_offset,
            generation,
            "Seek rescheduled"
        );

        match self.device.play() {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                Ok(timestamp_ms())
            }
            Err(e) => {
                error!(target, "Error restarting output after seek: {}", e);
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Paused;
                }
                Err(StreamError::PlaybackStartFailed(e))
            }
        }
    }

    /// Pause playback. No-op unless playing.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.device.pause();
            self.state = PlaybackState::Paused;
        }
    }

    /// Start the device again after a pause or a failed start.
    ///
    /// No-op when already playing or when nothing is queued.
    pub fn resume(&mut self) -> Result<f64, StreamError> {
        if self.state == PlaybackState::Playing || self.queue.is_empty() {
            return Ok(timestamp_ms());
        }
        self.device
            .play()
            .map_err(StreamError::PlaybackStartFailed)?;
        self.state = PlaybackState::Playing;
        Ok(timestamp_ms())
    }

    /// Stop the device and discard everything queued
    pub fn stop_and_clear(&mut self) {
        self.device.stop();
        self.device.reset();
        self.queue.clear();
        let generation = self.clock.reset_to(0.0);
        self.state = PlaybackState::Idle;
        info!(generation, "Playback stopped and buffers cleared");
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Seconds of audio played so far
    pub fn position(&self) -> f64 {
        self.clock.position()
    }

    /// Seconds of audio received for the current stream
    pub fn total_duration(&self) -> f64 {
        self.queue.total_duration(&self.format)
    }

    pub fn buffer_count(&self) -> usize {
        self.queue.len()
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state,
            buffers: self.queue.len(),
            buffered_seconds: self.total_duration(),
            position_seconds: self.position(),
            chunks_accepted: self.chunks_accepted,
            chunks_dropped: self.chunks_dropped,
            seeks: self.seeks,
            stale_completions: self.clock.stale_completions(),
        }
    }

    /// Schedule `buffer`, which ends at `end_frame` within the queue.
    /// Its completion moves the clock to that point.
    fn schedule(&self, buffer: SampleBuffer, end_frame: u64) -> Result<(), DeviceError> {
        let clock = self.clock.clone();
        let generation = clock.generation();
        let end_seconds = self.format.frames_to_seconds(end_frame);
        self.device.schedule(
            buffer,
            Box::new(move || {
                clock.complete(generation, end_seconds);
            }),
        )
    }
}
