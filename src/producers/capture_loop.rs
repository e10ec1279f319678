use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::core::{
    CaptureError, ComponentLogger, FrameBuffer, FrameBufferStats, LogContext, Shutdown,
};
use crate::producers::CaptureSource;

/// Bridges a [`CaptureSource`] into the shared [`FrameBuffer`] on a fixed
/// cadence.
pub struct FrameProducer {
    source: Box<dyn CaptureSource>,
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    shutdown: Shutdown,
    running: Arc<AtomicBool>,
    frames_captured: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct ProducerStatus {
    pub running: bool,
    pub frames_captured: u64,
    pub buffer_stats: FrameBufferStats,
}

/// Cheap handle for reading producer state while [`FrameProducer::run`]
/// owns the producer.
#[derive(Clone)]
pub struct ProducerHandle {
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    frames_captured: Arc<AtomicU64>,
}

impl ProducerHandle {
    pub fn status(&self) -> ProducerStatus {
        ProducerStatus {
            running: self.running.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            buffer_stats: self.buffer.stats(),
        }
    }
}

impl ComponentLogger for FrameProducer {
    fn log_context(&self) -> LogContext {
        LogContext::new("Capture", self.source.name())
    }
}

impl FrameProducer {
    pub fn new(
        source: Box<dyn CaptureSource>,
        buffer: Arc<FrameBuffer>,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            buffer,
            interval,
            shutdown,
            running: Arc::new(AtomicBool::new(false)),
            frames_captured: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn handle(&self) -> ProducerHandle {
        ProducerHandle {
            buffer: self.buffer.clone(),
            running: self.running.clone(),
            frames_captured: self.frames_captured.clone(),
        }
    }

    /// Capture one frame and insert it. Returns the buffered frame count.
    pub async fn tick(&mut self) -> Result<usize, CaptureError> {
        let frame = self.source.capture_frame().await?;
        let timestamp = frame.timestamp;
        let len = self.buffer.insert(frame);
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        if log::log_enabled!(log::Level::Trace) {
            let message = format!("buffered frame {} ({} in buffer)", timestamp, len);
            log::trace!("{}", self.log_context().format(&message));
        }
        Ok(len)
    }

    /// Runs until shutdown. A capture failure ends the loop and is returned;
    /// this loop never substitutes frames on its own.
    pub async fn run(mut self) -> Result<(), CaptureError> {
        self.info(&format!("starting every {:?}", self.interval));
        self.running.store(true, Ordering::SeqCst);

        let result = loop {
            if self.shutdown.is_triggered() {
                break Ok(());
            }
            if let Err(e) = self.tick().await {
                self.error(&format!("fatal: {}", e));
                break Err(e);
            }
            self.shutdown.wait_timeout(self.interval).await;
        };

        self.running.store(false, Ordering::SeqCst);
        self.info(&format!(
            "stopped after {} frames",
            self.frames_captured.load(Ordering::Relaxed)
        ));
        result
    }
}
