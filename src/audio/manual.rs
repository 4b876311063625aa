//! Headless output device driven by hand
//!
//! Renders nothing. Scheduled buffers wait until the caller completes them
//! with [`ManualOutput::complete_next`], or takes their handler out with
//! [`ManualOutput::take_next`] to fire it at a later point.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::audio::buffer::SampleBuffer;
use crate::audio::device::{validate_format, CompletionHandler, OutputDevice};
use crate::audio::format::AudioFormat;
use crate::error::DeviceError;

/// Calls made on the device, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connect,
    Schedule { frames: usize },
    Play,
    Pause,
    Stop,
    Reset,
}

#[derive(Default)]
struct ManualState {
    format: Option<AudioFormat>,
    scheduled: VecDeque<(SampleBuffer, CompletionHandler)>,
    playing: bool,
    fail_play: bool,
    events: Vec<DeviceEvent>,
}

#[derive(Default)]
pub struct ManualOutput {
    state: Mutex<ManualState>,
}

impl ManualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `play` calls fail until cleared
    pub fn set_fail_play(&self, fail: bool) {
        self.state.lock().fail_play = fail;
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Frame counts of scheduled, not yet completed buffers
    pub fn scheduled_frames(&self) -> Vec<usize> {
        self.state
            .lock()
            .scheduled
            .iter()
            .map(|(buffer, _)| buffer.frame_count())
            .collect()
    }

    /// Samples of the scheduled buffer at `index`
    pub fn scheduled_samples(&self, index: usize) -> Option<Vec<f32>> {
        self.state
            .lock()
            .scheduled
            .get(index)
            .map(|(buffer, _)| buffer.samples().to_vec())
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state.lock().events.clone()
    }

    /// Finish the oldest scheduled buffer and run its handler.
    ///
    /// Returns false when nothing is scheduled.
    pub fn complete_next(&self) -> bool {
        match self.take_next() {
            Some((_, handler)) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Remove the oldest scheduled buffer without running its handler
    pub fn take_next(&self) -> Option<(SampleBuffer, CompletionHandler)> {
        self.state.lock().scheduled.pop_front()
    }
}

impl OutputDevice for ManualOutput {
    fn connect(&self, format: &AudioFormat) -> Result<(), DeviceError> {
        validate_format(format)?;
        let mut state = self.state.lock();
        state.format = Some(*format);
        state.events.push(DeviceEvent::Connect);
        Ok(())
    }

    fn schedule(&self, buffer: SampleBuffer, on_complete: CompletionHandler) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.format.is_none() {
            return Err(DeviceError::NotConnected);
        }
        state.events.push(DeviceEvent::Schedule {
            frames: buffer.frame_count(),
        });
        state.scheduled.push_back((buffer, on_complete));
        Ok(())
    }

    fn play(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        state.events.push(DeviceEvent::Play);
        if state.fail_play {
            return Err(DeviceError::StreamError("Injected start failure".to_string()));
        }
        if state.format.is_none() {
            return Err(DeviceError::NotConnected);
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.events.push(DeviceEvent::Pause);
        state.playing = false;
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.events.push(DeviceEvent::Stop);
        state.playing = false;
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.events.push(DeviceEvent::Reset);
        state.scheduled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_schedule_requires_connect() {
        let output = ManualOutput::new();
        let buffer = SampleBuffer::from_samples(vec![0.0; 4]).unwrap();
        assert!(matches!(
            output.schedule(buffer, Box::new(|| {})),
            Err(DeviceError::NotConnected)
        ));
    }

    #[test]
    fn test_complete_runs_handlers_in_order() {
        let output = ManualOutput::new();
        output.connect(&AudioFormat::default()).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        for expected in 0..3 {
            let fired = fired.clone();
            let buffer = SampleBuffer::from_samples(vec![0.0; 8]).unwrap();
            output
                .schedule(
                    buffer,
                    Box::new(move || {
                        assert_eq!(fired.fetch_add(1, Ordering::SeqCst), expected);
                    }),
                )
                .unwrap();
        }

        while output.complete_next() {}
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reset_drops_handlers() {
        let output = ManualOutput::new();
        output.connect(&AudioFormat::default()).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_handler = fired.clone();
        output
            .schedule(
                SampleBuffer::from_samples(vec![0.0; 8]).unwrap(),
                Box::new(move || {
                    fired_in_handler.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        output.reset();
        assert!(!output.complete_next());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_injected_play_failure() {
        let output = ManualOutput::new();
        output.connect(&AudioFormat::default()).unwrap();
        output.set_fail_play(true);
        assert!(output.play().is_err());
        assert!(!output.is_playing());
        output.set_fail_play(false);
        assert!(output.play().is_ok());
        assert!(output.is_playing());
    }
}
