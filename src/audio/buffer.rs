//! Sample buffers and the playable buffer queue
//!
//! A [`SampleBuffer`] is immutable once built and cheap to clone, so the
//! queue and the output device can share the same samples. The
//! [`BufferQueue`] keeps its running length in whole frames; durations are
//! derived from that count rather than accumulated as floats.

use std::sync::Arc;

use crate::audio::format::AudioFormat;
use crate::constants::SAMPLE_SIZE;
use crate::error::StreamError;

/// Contiguous block of mono f32 samples
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
}

impl SampleBuffer {
    /// Build a buffer from raw native-endian f32 bytes.
    ///
    /// Fails with [`StreamError::MalformedChunk`] when the input is empty or
    /// its length is not a whole number of samples.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StreamError> {
        if data.is_empty() || data.len() % SAMPLE_SIZE != 0 {
            return Err(StreamError::MalformedChunk { len: data.len() });
        }

        // Copies into a fresh allocation, so input alignment doesn't matter
        let samples: Vec<f32> = bytemuck::pod_collect_to_vec(data);
        Ok(Self {
            samples: samples.into(),
        })
    }

    /// Build a buffer from decoded samples. Returns `None` if empty.
    pub fn from_samples(samples: Vec<f32>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        Some(Self {
            samples: samples.into(),
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    /// Self-contained copy of the frames from `frame_offset` to the end.
    ///
    /// Returns `None` when the offset leaves nothing to play.
    pub fn tail(&self, frame_offset: usize) -> Option<Self> {
        if frame_offset >= self.frame_count() {
            return None;
        }
        Self::from_samples(self.samples[frame_offset..].to_vec())
    }
}

/// Ordered buffers forming one contiguous playable segment
#[derive(Debug, Default)]
pub struct BufferQueue {
    buffers: Vec<SampleBuffer>,
    total_frames: u64,
}

impl BufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer, returning its index
    pub fn push(&mut self, buffer: SampleBuffer) -> usize {
        self.total_frames += buffer.frame_count() as u64;
        self.buffers.push(buffer);
        self.buffers.len() - 1
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
        self.total_frames = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleBuffer> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Duration of everything queued, in seconds
    pub fn total_duration(&self, format: &AudioFormat) -> f64 {
        format.frames_to_seconds(self.total_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    #[test]
    fn test_from_bytes_preserves_order() {
        let buffer = SampleBuffer::from_bytes(&bytes_of(&[0.25, -0.5, 1.0])).unwrap();
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.samples(), &[0.25, -0.5, 1.0]);
    }

    #[test]
    fn test_from_bytes_rejects_partial_sample() {
        let err = SampleBuffer::from_bytes(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, StreamError::MalformedChunk { len: 7 }));
    }

    #[test]
    fn test_from_bytes_rejects_empty() {
        assert!(matches!(
            SampleBuffer::from_bytes(&[]),
            Err(StreamError::MalformedChunk { len: 0 })
        ));
    }

    #[test]
    fn test_from_bytes_unaligned_input() {
        let mut raw = vec![0u8];
        raw.extend(bytes_of(&[0.5, 0.75]));
        let buffer = SampleBuffer::from_bytes(&raw[1..]).unwrap();
        assert_eq!(buffer.samples(), &[0.5, 0.75]);
    }

    #[test]
    fn test_tail_copy() {
        let buffer = SampleBuffer::from_samples(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let tail = buffer.tail(1).unwrap();
        assert_eq!(tail.samples(), &[2.0, 3.0, 4.0]);
        assert!(buffer.tail(4).is_none());
        assert!(buffer.tail(10).is_none());
    }

    #[test]
    fn test_queue_tracks_total_duration() {
        let format = AudioFormat::default();
        let mut queue = BufferQueue::new();

        queue.push(SampleBuffer::from_samples(vec![0.0; 4410]).unwrap());
        queue.push(SampleBuffer::from_samples(vec![0.0; 4410]).unwrap());
        let last = queue.push(SampleBuffer::from_samples(vec![0.0; 2205]).unwrap());

        assert_eq!(last, 2);
        assert_eq!(queue.total_frames(), 11_025);
        assert!((queue.total_duration(&format) - 0.25).abs() < 1e-12);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.total_duration(&format), 0.0);
    }
}
