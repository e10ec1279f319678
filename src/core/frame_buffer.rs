use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::error::{BufferError, BufferResult};
use crate::core::frame::Frame;
use crate::core::lock::lock_mutex;
use crate::core::logging::{ComponentLogger, LogContext};

/// Bounded, insertion-ordered window of captured frames keyed by timestamp.
///
/// When full, inserting a new timestamp evicts the oldest-inserted frame
/// (FIFO, not LRU: lookups never refresh an entry). Re-inserting a timestamp
/// that is already buffered replaces its frame in place without evicting.
///
/// Every method takes the internal lock for exactly one call; nothing here
/// awaits, so the lock is never held across a suspension point.
pub struct FrameBuffer {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    evicted: AtomicU64,
}

impl FrameBuffer {
    /// `capacity` is clamped to at least one frame.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            evicted: AtomicU64::new(0),
        }
    }

    /// Insert a frame under its own timestamp.
    /// Returns the number of buffered frames afterwards.
    pub fn insert(&self, frame: Frame) -> usize {
        let mut frames = lock_mutex(&self.frames, "FrameBuffer::insert");

        if let Some(existing) = frames.iter_mut().find(|f| f.timestamp == frame.timestamp) {
            *existing = frame;
        } else {
            if frames.len() >= self.capacity {
                if let Some(old) = frames.pop_front() {
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                    log::trace!("[buffer] evicted frame {}", old.timestamp);
                }
            }
            frames.push_back(frame);
        }

        if let (Some(first), Some(last)) = (frames.front(), frames.back()) {
            log::debug!(
                "[buffer] first frame {}\tlast frame {}\t({}/{})",
                first.timestamp,
                last.timestamp,
                frames.len(),
                self.capacity
            );
        }

        frames.len()
    }

    /// Most recently inserted frame, if any.
    pub fn latest(&self) -> Option<Frame> {
        lock_mutex(&self.frames, "FrameBuffer::latest").back().cloned()
    }

    /// Frame whose timestamp is nearest to `target`.
    ///
    /// Ties go to the entry inserted first, i.e. the lower timestamp when
    /// timestamps arrive in order. Calling this on an empty buffer is a
    /// contract violation and yields [`BufferError::Empty`].
    pub fn closest_to(&self, target: i64) -> BufferResult<Frame> {
        // min_by_key liefert bei Gleichstand das erste Element
        let closest = lock_mutex(&self.frames, "FrameBuffer::closest_to")
            .iter()
            .min_by_key(|f| f.timestamp.abs_diff(target))
            .cloned();

        match closest {
            Some(frame) => Ok(frame),
            None => {
                self.error(&format!(
                    "closest_to({}) called before any frame was captured",
                    target
                ));
                Err(BufferError::Empty { target })
            }
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        lock_mutex(&self.frames, "FrameBuffer::contains")
            .iter()
            .any(|f| f.timestamp == timestamp)
    }

    /// Buffered timestamps in insertion order.
    pub fn timestamps(&self) -> Vec<i64> {
        lock_mutex(&self.frames, "FrameBuffer::timestamps")
            .iter()
            .map(|f| f.timestamp)
            .collect()
    }

    pub fn len(&self) -> usize {
        lock_mutex(&self.frames, "FrameBuffer::len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> FrameBufferStats {
        let frames = lock_mutex(&self.frames, "FrameBuffer::stats");
        FrameBufferStats {
            capacity: self.capacity,
            len: frames.len(),
            evicted: self.evicted.load(Ordering::Relaxed),
            oldest_timestamp: frames.front().map(|f| f.timestamp),
            latest_timestamp: frames.back().map(|f| f.timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferStats {
    pub capacity: usize,
    pub len: usize,
    pub evicted: u64,
    pub oldest_timestamp: Option<i64>,
    pub latest_timestamp: Option<i64>,
}

impl ComponentLogger for FrameBuffer {
    fn log_context(&self) -> LogContext {
        LogContext::new("FrameBuffer", &format!("frames/{}", self.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FrameFormat;

    fn frame(ts: i64) -> Frame {
        Frame::new(ts, FrameFormat::Jpeg, ts.to_le_bytes().to_vec())
    }

    #[test]
    fn test_basic_buffer_operations() {
        let buffer = FrameBuffer::new(10);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.latest().is_none());

        assert_eq!(buffer.insert(frame(100)), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest().unwrap().timestamp, 100);

        // latest() ist nebenwirkungsfrei
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_buffer_wrap_around() {
        let buffer = FrameBuffer::new(3);
        for ts in 0..5 {
            buffer.insert(frame(ts));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.timestamps(), vec![2, 3, 4]);
        assert_eq!(buffer.stats().evicted, 2);
    }

    #[test]
    fn duplicate_timestamp_replaces_in_place() {
        let buffer = FrameBuffer::new(2);
        buffer.insert(frame(10));
        buffer.insert(frame(11));
        buffer.insert(Frame::new(11, FrameFormat::Png, vec![9]));

        assert_eq!(buffer.timestamps(), vec![10, 11]);
        assert_eq!(buffer.stats().evicted, 0);
        let latest = buffer.latest().unwrap();
        assert_eq!(latest.format, FrameFormat::Png);
        assert_eq!(latest.payload.as_ref(), &[9u8]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buffer = FrameBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.insert(frame(1));
        buffer.insert(frame(2));
        assert_eq!(buffer.timestamps(), vec![2]);
    }

    #[test]
    fn closest_handles_extreme_targets() {
        let buffer = FrameBuffer::new(4);
        buffer.insert(frame(-5));
        buffer.insert(frame(i64::MAX - 1));

        assert_eq!(buffer.closest_to(i64::MIN).unwrap().timestamp, -5);
        assert_eq!(buffer.closest_to(i64::MAX).unwrap().timestamp, i64::MAX - 1);
    }

    #[test]
    fn stats_track_window() {
        let buffer = FrameBuffer::new(2);
        assert_eq!(buffer.stats().oldest_timestamp, None);

        buffer.insert(frame(7));
        buffer.insert(frame(8));
        buffer.insert(frame(9));

        let stats = buffer.stats();
        assert_eq!(stats.len, 2);
        assert_eq!(stats.oldest_timestamp, Some(8));
        assert_eq!(stats.latest_timestamp, Some(9));
        assert!(buffer.contains(9));
        assert!(!buffer.contains(7));
    }

    #[test]
    fn test_log_context_names_capacity() {
        let buffer = FrameBuffer::new(3);
        let ctx = buffer.log_context();
        assert_eq!(ctx.component, "FrameBuffer");
        assert_eq!(ctx.instance_id, "frames/3");
        assert_eq!(buffer.log_context().instance_id, ctx.instance_id);
    }
}
