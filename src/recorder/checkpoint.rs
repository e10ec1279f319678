// src/recorder/checkpoint.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::core::{ComponentLogger, FrameBuffer, LogContext, Shutdown};
use super::FrameStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Written(i64),
    Empty,
    Failed(i64),
}

/// Periodically persists the newest buffered frame.
pub struct Checkpointer {
    buffer: Arc<FrameBuffer>,
    store: Arc<dyn FrameStore>,
    session: String,
    interval: Duration,
    shutdown: Shutdown,
    written: AtomicU64,
    failed: AtomicU64,
}

impl ComponentLogger for Checkpointer {
    fn log_context(&self) -> LogContext {
        LogContext::new("Checkpoint", &self.session)
    }
}

impl Checkpointer {
    pub fn new(
        buffer: Arc<FrameBuffer>,
        store: Arc<dyn FrameStore>,
        session: &str,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            buffer,
            store,
            session: session.to_string(),
            interval,
            shutdown,
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// One checkpoint. Write failures are logged and reported, never raised:
    /// the next tick simply takes whatever is latest by then.
    pub async fn tick(&self) -> CheckpointOutcome {
        let Some(frame) = self.buffer.latest() else {
            self.debug("buffer empty, nothing to save");
            return CheckpointOutcome::Empty;
        };

        match self.store.write_frame(&self.session, &frame).await {
            Ok(path) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                self.info(&format!("frame saved to disk: {} ({:?})", frame.timestamp, path));
                CheckpointOutcome::Written(frame.timestamp)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.error(&format!("failed to write frame {}: {}", frame.timestamp, e));
                CheckpointOutcome::Failed(frame.timestamp)
            }
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.info(&format!("starting every {:?}", self.interval));

        while !self.shutdown.is_triggered() {
            self.tick().await;
            self.shutdown.wait_timeout(self.interval).await;
        }

        self.info(&format!(
            "stopped ({} written, {} failed)",
            self.written(),
            self.failed()
        ));
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
