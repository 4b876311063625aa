//! Seek engine
//!
//! Maps a target time onto a buffer index and frame offset within the
//! queue, then builds the buffer list that resumes playback from there.
//!
//! Accumulation is done in whole frames. The target is rounded to the
//! nearest frame once, so a target sitting on a buffer boundary always lands
//! at offset 0 of the following buffer instead of at the end of the
//! preceding one.

use crate::audio::buffer::{BufferQueue, SampleBuffer};
use crate::audio::format::AudioFormat;
use crate::error::StreamError;

/// Where in the queue a seek lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoint {
    pub buffer_index: usize,
    pub frame_offset: usize,
}

/// A buffer to reschedule and the queue frame at which it ends
#[derive(Debug, Clone)]
pub struct PlannedBuffer {
    pub buffer: SampleBuffer,
    pub end_frame: u64,
}

/// Buffers to schedule, in order, to resume from a seek point
#[derive(Debug, Clone)]
pub struct SeekPlan {
    pub point: SeekPoint,
    pub target: f64,
    pub buffers: Vec<PlannedBuffer>,
}

impl SeekPlan {
    pub fn total_frames(&self) -> usize {
        self.buffers.iter().map(|planned| planned.buffer.frame_count()).sum()
    }
}

/// Find the split buffer and frame offset for `target` seconds.
///
/// `target` must lie in `[0, total_duration)`.
pub fn locate(
    queue: &BufferQueue,
    format: &AudioFormat,
    target: f64,
) -> Result<SeekPoint, StreamError> {
    let total = queue.total_duration(format);
    // Written to also reject NaN
    if !(target >= 0.0 && target < total) {
        return Err(StreamError::InvalidSeekTime { target, total });
    }

    // A target just under the end can round up onto it
    let target_frame = format
        .seconds_to_frames(target)
        .min(queue.total_frames().saturating_sub(1));

    let mut accumulated = 0u64;
    for (index, buffer) in queue.iter().enumerate() {
        let frames = buffer.frame_count() as u64;
        if accumulated + frames > target_frame {
            return Ok(SeekPoint {
                buffer_index: index,
                frame_offset: (target_frame - accumulated) as usize,
            });
        }
        accumulated += frames;
    }

    Err(StreamError::InvalidSeekTime { target, total })
}

/// Locate `target` and build the resumption schedule: a tail copy of the
/// split buffer followed by every later buffer, unmodified.
pub fn plan(
    queue: &BufferQueue,
    format: &AudioFormat,
    target: f64,
) -> Result<SeekPlan, StreamError> {
    let point = locate(queue, format, target)?;

    let mut buffers = Vec::with_capacity(queue.len() - point.buffer_index);
    let mut end_frame = 0u64;
    for (index, buffer) in queue.iter().enumerate() {
        end_frame += buffer.frame_count() as u64;
        if index < point.buffer_index {
            continue;
        }

        let buffer = if index == point.buffer_index && point.frame_offset > 0 {
            match buffer.tail(point.frame_offset) {
                Some(tail) => tail,
                None => continue,
            }
        } else {
            buffer.clone()
        };
        buffers.push(PlannedBuffer { buffer, end_frame });
    }

    Ok(SeekPlan {
        point,
        target,
        buffers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(lengths: &[usize]) -> BufferQueue {
        let mut queue = BufferQueue::new();
        let mut next = 0.0f32;
        for &len in lengths {
            let samples = (0..len)
                .map(|_| {
                    next += 1.0;
                    next
                })
                .collect();
            queue.push(SampleBuffer::from_samples(samples).unwrap());
        }
        queue
    }

    #[test]
    fn test_split_mid_buffer() {
        let format = AudioFormat::default();
        let queue = queue_of(&[4410, 4410, 2205]);

        let plan = plan(&queue, &format, 0.15).unwrap();
        assert_eq!(
            plan.point,
            SeekPoint {
                buffer_index: 1,
                frame_offset: 2205
            }
        );
        assert_eq!(plan.buffers.len(), 2);
        assert_eq!(plan.buffers[0].buffer.frame_count(), 2205);
        assert_eq!(plan.buffers[1].buffer.frame_count(), 2205);
        // First frame of the tail is global frame 4410 + 2205, numbered from 1
        assert_eq!(plan.buffers[0].buffer.samples()[0], 6616.0);
        assert_eq!(plan.buffers[0].end_frame, 8820);
        assert_eq!(plan.buffers[1].end_frame, 11_025);
        assert_eq!(plan.total_frames(), 4410);
    }

    #[test]
    fn test_boundary_selects_next_buffer() {
        let format = AudioFormat::default();
        let queue = queue_of(&[4410, 4410, 2205]);

        for (target, index) in [(0.1, 1), (0.2, 2)] {
            let point = locate(&queue, &format, target).unwrap();
            assert_eq!(point.buffer_index, index, "target {target}");
            assert_eq!(point.frame_offset, 0, "target {target}");
        }

        let plan = plan(&queue, &format, 0.1).unwrap();
        assert_eq!(plan.buffers.len(), 2);
        assert_eq!(plan.buffers[0].buffer.frame_count(), 4410);
        assert_eq!(plan.buffers[0].end_frame, 8820);
    }

    #[test]
    fn test_zero_target_replays_everything() {
        let format = AudioFormat::default();
        let queue = queue_of(&[100, 200]);
        let plan = plan(&queue, &format, 0.0).unwrap();
        assert_eq!(plan.point.buffer_index, 0);
        assert_eq!(plan.total_frames(), 300);
    }

    #[test]
    fn test_accumulated_rounding_over_many_buffers() {
        // 0.1 s buffers accumulate float error quickly
        let format = AudioFormat::default();
        let queue = queue_of(&[4410; 30]);
        let point = locate(&queue, &format, 2.3).unwrap();
        assert_eq!(
            point,
            SeekPoint {
                buffer_index: 23,
                frame_offset: 0
            }
        );
    }

    #[test]
    fn test_target_just_below_end() {
        let format = AudioFormat::default();
        let queue = queue_of(&[4410]);
        let point = locate(&queue, &format, 0.1 - 1e-9).unwrap();
        assert_eq!(point.buffer_index, 0);
        assert_eq!(point.frame_offset, 4409);
    }

    #[test]
    fn test_out_of_range_targets() {
        let format = AudioFormat::default();
        let queue = queue_of(&[4410]);

        for target in [-0.01, 0.1, 5.0, f64::NAN] {
            assert!(matches!(
                locate(&queue, &format, target),
                Err(StreamError::InvalidSeekTime { .. })
            ));
        }
        assert!(locate(&BufferQueue::new(), &format, 0.0).is_err());
    }
}
