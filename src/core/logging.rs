// src/core/logging.rs
use std::sync::atomic::{AtomicU64, Ordering};

// Globale Sequenznummer für Korrelation
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub job_id: Option<String>,
    pub sequence: u64,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            job_id: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn with_job(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    pub fn format(&self, message: &str) -> String {
        let job_info = match &self.job_id {
            Some(job) => format!(" job={}", job),
            None => String::new(),
        };

        format!(
            "[seq={:06}][{}:{}{}] {}",
            self.sequence, self.component, self.instance_id, job_info, message
        )
    }
}

/// Helper trait für einheitliches Logging
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn debug(&self, message: &str) {
        log::debug!("{}", self.log_context().format(message));
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format(message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format(message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format(message));
    }

    /// Logs on behalf of one job, tagging the line with its id.
    fn log_job(&self, level: log::Level, job_id: &str, message: &str) {
        log::log!(level, "{}", self.log_context().with_job(job_id).format(message));
    }

    fn trace_buffer(&self, buffer: &super::frame_buffer::FrameBuffer) {
        let stats = buffer.stats();
        let buffer_info = format!(
            "buffer frames={}/{} evicted={} oldest={:?} latest={:?}",
            stats.len,
            stats.capacity,
            stats.evicted,
            stats.oldest_timestamp,
            stats.latest_timestamp
        );
        log::debug!("{}", self.log_context().format(&buffer_info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let ctx = LogContext::new("Capture", "synthetic");

        assert_eq!(ctx.component, "Capture");
        assert_eq!(ctx.instance_id, "synthetic");
        assert!(ctx.sequence > 0);
        assert!(ctx.job_id.is_none());

        let next = LogContext::new("Capture", "synthetic");
        assert!(next.sequence > ctx.sequence);
    }

    #[test]
    fn test_log_formatting_with_job() {
        let ctx = LogContext::new("Resolver", "session-1");
        let formatted = ctx.format("claiming");
        assert!(formatted.contains("[Resolver:session-1]"));
        assert!(formatted.contains("claiming"));
        assert!(!formatted.contains("job="));

        let formatted = ctx.with_job("abc").format("claiming");
        assert!(formatted.contains("job=abc"));
    }
}
