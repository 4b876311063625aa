//! cpal-backed output device
//!
//! The stream lives on a dedicated thread since cpal streams are not `Send`.
//! The render callback pulls samples from a shared schedule; when a buffer
//! runs out its completion handler is forwarded over a channel to a notifier
//! thread, so handlers never run on the render thread.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer::SampleBuffer;
use crate::audio::device::{find_output_device, validate_format, CompletionHandler, OutputDevice};
use crate::audio::format::AudioFormat;
use crate::constants::COMPLETION_CHANNEL_CAPACITY;
use crate::error::DeviceError;

const STREAM_START_TIMEOUT: Duration = Duration::from_secs(2);

struct Scheduled {
    buffer: SampleBuffer,
    cursor: usize,
    on_complete: Option<CompletionHandler>,
}

#[derive(Default)]
struct RenderState {
    queue: VecDeque<Scheduled>,
    playing: bool,
}

impl RenderState {
    fn next_sample(
        &mut self,
        completions: &Sender<CompletionHandler>,
        counters: &RenderCounters,
    ) -> Option<f32> {
        let item = self.queue.front_mut()?;
        let sample = item.buffer.samples()[item.cursor];
        item.cursor += 1;

        if item.cursor == item.buffer.frame_count() {
            if let Some(handler) = self.queue.pop_front().and_then(|done| done.on_complete) {
                if completions.try_send(handler).is_err() {
                    counters.dropped_completions.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Completion channel full, dropping notification");
                }
            }
        }
        Some(sample)
    }
}

/// Counters updated from the render callback
#[derive(Debug, Default)]
struct RenderCounters {
    frames_rendered: AtomicU64,
    underruns: AtomicU64,
    dropped_completions: AtomicU64,
}

/// Output statistics
#[derive(Debug, Clone, Default)]
pub struct OutputStats {
    pub frames_rendered: u64,
    pub underruns: u64,
    /// Completions lost to a full notifier channel. Any non-zero value means
    /// the playback position stopped advancing until the next seek or reset.
    pub dropped_completions: u64,
}

struct StreamThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Output device rendering to a cpal stream
pub struct CpalOutput {
    device_name: Option<String>,
    buffer_size: Option<u32>,
    format: Mutex<Option<AudioFormat>>,
    render: Arc<Mutex<RenderState>>,
    stream: Mutex<Option<StreamThread>>,
    completion_tx: Sender<CompletionHandler>,
    counters: Arc<RenderCounters>,
}

impl CpalOutput {
    /// Create an output for the named device (default device for `None`).
    ///
    /// Nothing is opened until the first `play`.
    pub fn new(device_name: Option<String>, buffer_size: Option<u32>) -> Result<Self, DeviceError> {
        let (completion_tx, completion_rx) = bounded::<CompletionHandler>(COMPLETION_CHANNEL_CAPACITY);

        thread::Builder::new()
            .name("completion-notifier".to_string())
            .spawn(move || run_notifier(completion_rx))
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        Ok(Self {
            device_name,
            buffer_size,
            format: Mutex::new(None),
            render: Arc::new(Mutex::new(RenderState::default())),
            stream: Mutex::new(None),
            completion_tx,
            counters: Arc::new(RenderCounters::default()),
        })
    }

    pub fn stats(&self) -> OutputStats {
        OutputStats {
            frames_rendered: self.counters.frames_rendered.load(Ordering::Relaxed),
            underruns: self.counters.underruns.load(Ordering::Relaxed),
            dropped_completions: self.counters.dropped_completions.load(Ordering::Relaxed),
        }
    }

    /// Number of buffers waiting to be rendered
    pub fn pending_buffers(&self) -> usize {
        self.render.lock().queue.len()
    }

    fn ensure_stream(&self, format: &AudioFormat) -> Result<(), DeviceError> {
        let mut slot = self.stream.lock();
        if let Some(existing) = slot.as_ref() {
            if existing.running.load(Ordering::SeqCst) && !existing.handle.is_finished() {
                return Ok(());
            }
        }
        if let Some(dead) = slot.take() {
            dead.running.store(false, Ordering::SeqCst);
            let _ = dead.handle.join();
        }

        let device = find_output_device(self.device_name.as_deref())?;
        let default_config = device
            .default_output_config()
            .map_err(|e| DeviceError::CpalError(e.to_string()))?;

        let channels = default_config.channels();
        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(format.sample_rate.round() as u32),
            buffer_size: match self.buffer_size {
                Some(size) => cpal::BufferSize::Fixed(size),
                None => cpal::BufferSize::Default,
            },
        };

        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();
        let render = self.render.clone();
        let completions = self.completion_tx.clone();
        let counters = self.counters.clone();
        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);

        let handle = thread::Builder::new()
            .name("pcm-output".to_string())
            .spawn(move || {
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        render_callback(data, channels as usize, &render, &completions, &counters);
                    },
                    move |err| {
                        tracing::error!("Output stream error: {}", err);
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::CpalError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream is dropped here, stopping output
            })
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        match ready_rx.recv_timeout(STREAM_START_TIMEOUT) {
            Ok(Ok(())) => {
                tracing::info!(
                    device = self.device_name.as_deref().unwrap_or("default"),
                    channels,
                    "Output stream started"
                );
                *slot = Some(StreamThread { running, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                Err(DeviceError::StreamError("Timed out starting output stream".to_string()))
            }
        }
    }
}

fn render_callback(
    data: &mut [f32],
    channels: usize,
    render: &Mutex<RenderState>,
    completions: &Sender<CompletionHandler>,
    counters: &RenderCounters,
) {
    // Never block the render thread on the control side
    let Some(mut state) = render.try_lock() else {
        data.fill(0.0);
        return;
    };
    if !state.playing {
        data.fill(0.0);
        return;
    }

    let mut rendered = 0u64;
    let mut starved = false;
    for frame in data.chunks_mut(channels.max(1)) {
        match state.next_sample(completions, counters) {
            Some(sample) => {
                frame.fill(sample);
                rendered += 1;
            }
            None => {
                frame.fill(0.0);
                starved = true;
            }
        }
    }

    counters.frames_rendered.fetch_add(rendered, Ordering::Relaxed);
    if starved {
        counters.underruns.fetch_add(1, Ordering::Relaxed);
    }
}

fn run_notifier(completions: Receiver<CompletionHandler>) {
    for handler in completions.iter() {
        handler();
    }
    tracing::debug!("Completion notifier exiting");
}

impl OutputDevice for CpalOutput {
    fn connect(&self, format: &AudioFormat) -> Result<(), DeviceError> {
        validate_format(format)?;
        *self.format.lock() = Some(*format);
        Ok(())
    }

    fn schedule(&self, buffer: SampleBuffer, on_complete: CompletionHandler) -> Result<(), DeviceError> {
        if self.format.lock().is_none() {
            return Err(DeviceError::NotConnected);
        }
        self.render.lock().queue.push_back(Scheduled {
            buffer,
            cursor: 0,
            on_complete: Some(on_complete),
        });
        Ok(())
    }

    fn play(&self) -> Result<(), DeviceError> {
        let format = (*self.format.lock()).ok_or(DeviceError::NotConnected)?;
        self.ensure_stream(&format)?;
        self.render.lock().playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.render.lock().playing = false;
    }

    fn stop(&self) {
        self.render.lock().playing = false;
    }

    fn reset(&self) {
        self.render.lock().queue.clear();
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.lock().take() {
            stream.running.store(false, Ordering::SeqCst);
            let _ = stream.handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_render_fires_completion_in_order() {
        let (tx, rx) = bounded::<CompletionHandler>(8);
        let render = Mutex::new(RenderState {
            playing: true,
            ..Default::default()
        });
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..2 {
            let order = order.clone();
            render.lock().queue.push_back(Scheduled {
                buffer: SampleBuffer::from_samples(vec![id as f32 + 1.0; 3]).unwrap(),
                cursor: 0,
                on_complete: Some(Box::new(move || order.lock().push(id))),
            });
        }

        // Stereo output, 4 frames per callback
        let counters = RenderCounters::default();
        let mut data = vec![9.0f32; 8];
        render_callback(&mut data, 2, &render, &tx, &counters);
        assert_eq!(data, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);

        render_callback(&mut data, 2, &render, &tx, &counters);
        assert_eq!(&data[..4], &[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(&data[4..], &[0.0; 4]);
        assert_eq!(counters.frames_rendered.load(Ordering::Relaxed), 6);
        assert_eq!(counters.underruns.load(Ordering::Relaxed), 1);
        assert_eq!(counters.dropped_completions.load(Ordering::Relaxed), 0);

        for handler in rx.try_iter() {
            handler();
        }
        assert_eq!(*order.lock(), vec![0, 1]);
    }

    #[test]
    fn test_paused_renders_silence() {
        let (tx, rx) = bounded::<CompletionHandler>(8);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_handler = fired.clone();
        let render = Mutex::new(RenderState::default());
        render.lock().queue.push_back(Scheduled {
            buffer: SampleBuffer::from_samples(vec![0.5; 2]).unwrap(),
            cursor: 0,
            on_complete: Some(Box::new(move || {
                fired_in_handler.fetch_add(1, Ordering::SeqCst);
            })),
        });

        let mut data = vec![1.0f32; 4];
        render_callback(&mut data, 1, &render, &tx, &RenderCounters::default());
        assert_eq!(data, vec![0.0; 4]);
        assert!(rx.try_recv().is_err());
        assert_eq!(render.lock().queue.len(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_full_completion_channel_is_counted() {
        let (tx, rx) = bounded::<CompletionHandler>(1);
        let render = Mutex::new(RenderState {
            playing: true,
            ..Default::default()
        });
        for _ in 0..3 {
            render.lock().queue.push_back(Scheduled {
                buffer: SampleBuffer::from_samples(vec![0.5; 2]).unwrap(),
                cursor: 0,
                on_complete: Some(Box::new(|| {})),
            });
        }

        let counters = RenderCounters::default();
        let mut data = vec![0.0f32; 6];
        render_callback(&mut data, 1, &render, &tx, &counters);

        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(counters.dropped_completions.load(Ordering::Relaxed), 2);
        assert!(render.lock().queue.is_empty());
    }
}
