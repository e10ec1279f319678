use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::lock::lock_mutex;
use crate::core::{CaptureError, Frame, FrameFormat, PublishError, StoreError};
use crate::producers::CaptureSource;
use crate::publish::FramePublisher;
use crate::recorder::FrameStore;

/// Capture source with a predictable timeline.
///
/// Call `i` (failed calls included) yields timestamp `start + i`, unless `i`
/// was marked with [`fail_at`](Self::fail_at). A source built with
/// [`from_timestamps`](Self::from_timestamps) yields exactly those
/// timestamps and then fails.
pub struct ScriptedCapture {
    name: String,
    start: i64,
    script: Option<Vec<i64>>,
    failures: HashSet<usize>,
    calls: usize,
}

impl ScriptedCapture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: 100,
            script: None,
            failures: HashSet::new(),
            calls: 0,
        }
    }

    pub fn from_timestamps(name: &str, timestamps: Vec<i64>) -> Self {
        Self {
            script: Some(timestamps),
            ..Self::new(name)
        }
    }

    pub fn starting_at(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    pub fn fail_at(mut self, call: usize) -> Self {
        self.failures.insert(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let call = self.calls;
        self.calls += 1;

        if self.failures.contains(&call) {
            return Err(CaptureError::message(format!(
                "{}: scripted failure at call {}",
                self.name, call
            )));
        }

        let timestamp = match &self.script {
            Some(script) => *script.get(call).ok_or_else(|| {
                CaptureError::message(format!("{}: script exhausted", self.name))
            })?,
            None => self.start + call as i64,
        };

        Ok(Frame::new(
            timestamp,
            FrameFormat::Jpeg,
            format!("frame-{}", timestamp).into_bytes(),
        ))
    }
}

/// [`FrameStore`] that only records `(session, timestamp)` of successful
/// writes.
#[derive(Default)]
pub struct RecordingStore {
    writes: Mutex<Vec<(String, i64)>>,
    fail_remaining: AtomicUsize,
    delay: Option<Duration>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` writes.
    pub fn fail_first(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Sleep before every write, widening the window between a unit's read
    /// and its commit.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn writes(&self) -> Vec<(String, i64)> {
        lock_mutex(&self.writes, "RecordingStore::writes").clone()
    }
}

fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl FrameStore for RecordingStore {
    async fn write_frame(&self, session: &str, frame: &Frame) -> Result<PathBuf, StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if take_failure(&self.fail_remaining) {
            return Err(StoreError::message(format!(
                "injected write failure for frame {}",
                frame.timestamp
            )));
        }

        lock_mutex(&self.writes, "RecordingStore::write_frame")
            .push((session.to_string(), frame.timestamp));
        Ok(PathBuf::from(session).join(frame.file_name()))
    }
}

/// [`FramePublisher`] that records `(session, timestamp)` of successful
/// uploads.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, i64)>>>,
    fail_remaining: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_first(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Shared log that stays readable after the publisher was boxed away.
    pub fn published_handle(&self) -> Arc<Mutex<Vec<(String, i64)>>> {
        self.published.clone()
    }

    pub fn published(&self) -> Vec<(String, i64)> {
        lock_mutex(&self.published, "RecordingPublisher::published").clone()
    }
}

#[async_trait]
impl FramePublisher for RecordingPublisher {
    async fn publish_frame(&self, session: &str, frame: &Frame) -> Result<String, PublishError> {
        let key = crate::publish::object_key(session, frame);
        if take_failure(&self.fail_remaining) {
            return Err(PublishError::Transport {
                key,
                message: "injected publish failure".to_string(),
            });
        }

        lock_mutex(&self.published, "RecordingPublisher::publish_frame")
            .push((session.to_string(), frame.timestamp));
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_capture_counts_failed_calls() {
        let mut capture = ScriptedCapture::new("cam").fail_at(1);
        assert_eq!(capture.capture_frame().await.unwrap().timestamp, 100);
        assert!(capture.capture_frame().await.is_err());
        assert_eq!(capture.capture_frame().await.unwrap().timestamp, 102);
        assert_eq!(capture.calls(), 3);
    }

    #[tokio::test]
    async fn store_fails_first_n() {
        let store = RecordingStore::new().fail_first(2);
        let frame = Frame::new(5, FrameFormat::Png, vec![1]);
        assert!(store.write_frame("s", &frame).await.is_err());
        assert!(store.write_frame("s", &frame).await.is_err());
        assert!(store.write_frame("s", &frame).await.is_ok());
        assert_eq!(store.writes(), vec![("s".to_string(), 5)]);
    }
}
