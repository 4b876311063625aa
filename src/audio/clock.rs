//! Playback clock
//!
//! Position is written from two places: device completion handlers move it
//! to the end time of each finished buffer, and the control side sets it
//! outright on seek or reset. Every reset starts a new generation; handlers
//! carry the generation they were scheduled under and are dropped if it is
//! no longer current.
//!
//! Completions carry absolute end times rather than durations, so the
//! position after the last buffer equals the buffered duration exactly,
//! however the seek target fell between frames.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ClockState {
    generation: u64,
    position: f64,
}

/// Generation-tagged playback position, in seconds
#[derive(Debug, Default)]
pub struct PlaybackClock {
    state: Mutex<ClockState>,
    stale_completions: AtomicU64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn position(&self) -> f64 {
        self.state.lock().position
    }

    /// Apply a completion scheduled under `generation` for a buffer ending
    /// at `end_seconds`. Never moves the position backwards.
    ///
    /// Returns false, leaving the position untouched, if the generation is
    /// stale.
    pub fn complete(&self, generation: u64, end_seconds: f64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            drop(state);
            self.stale_completions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(generation, "Ignoring stale completion");
            return false;
        }
        state.position = state.position.max(end_seconds);
        true
    }

    /// Set the position directly and start a new generation
    pub fn reset_to(&self, seconds: f64) -> u64 {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        state.position = seconds;
        state.generation
    }

    /// Completions dropped because their generation had ended
    pub fn stale_completions(&self) -> u64 {
        self.stale_completions.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a playback clock
pub type SharedClock = Arc<PlaybackClock>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_complete_within_generation() {
        let clock = PlaybackClock::new();
        let gen = clock.generation();
        assert!(clock.complete(gen, 0.1));
        assert!(clock.complete(gen, 0.15));
        assert_eq!(clock.position(), 0.15);
    }

    #[test]
    fn test_complete_never_moves_backwards() {
        let clock = PlaybackClock::new();
        let gen = clock.reset_to(0.12);
        assert!(clock.complete(gen, 0.1));
        assert_eq!(clock.position(), 0.12);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let clock = PlaybackClock::new();
        let old = clock.generation();
        let new = clock.reset_to(1.5);

        assert_ne!(old, new);
        assert!(!clock.complete(old, 2.0));
        assert_eq!(clock.position(), 1.5);
        assert_eq!(clock.stale_completions(), 1);
    }

    #[test]
    fn test_completion_racing_reset() {
        let clock = Arc::new(PlaybackClock::new());
        let gen = clock.generation();

        let completer = {
            let clock = clock.clone();
            thread::spawn(move || {
                for i in 1..=1000 {
                    clock.complete(gen, i as f64 * 0.001);
                }
            })
        };
        let new_gen = clock.reset_to(5.0);
        completer.join().unwrap();

        // Whatever landed before the reset was overwritten, nothing after it
        // counted
        assert_eq!(clock.position(), 5.0);
        assert_eq!(clock.generation(), new_gen);
    }
}
