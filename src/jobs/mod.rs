pub mod memory;
pub mod resolver;
pub mod spool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::JobQueueError;

pub use memory::MemoryJobQueue;
pub use resolver::{JobResolver, Resolution};
pub use spool::SpoolJobQueue;

/// An external request for the frame nearest `date_created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    /// Requested target timestamp, seconds since epoch.
    pub date_created: i64,
    /// Timestamp of the frame that answered the job; `None` while open.
    #[serde(default)]
    pub media_timestamp: Option<i64>,
}

impl Job {
    pub fn new(id: impl Into<String>, date_created: i64) -> Self {
        Self {
            id: id.into(),
            date_created,
            media_timestamp: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.media_timestamp.is_some()
    }
}

/// The external job queue. It owns consistency; this side only issues
/// self-contained requests.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Up to `limit` jobs whose `media_timestamp` is unset.
    async fn fetch_unresolved(&self, limit: usize) -> Result<Vec<Job>, JobQueueError>;

    async fn begin(&self) -> Result<Box<dyn JobTransaction>, JobQueueError>;
}

/// Optimistic read-check-write transaction.
///
/// `read` records what was seen; `commit` applies staged updates atomically
/// and fails with [`JobQueueError::Conflict`] if anything read has changed
/// since. A transaction is meant to be committed at most once.
#[async_trait]
pub trait JobTransaction: Send {
    async fn read(&mut self, job_id: &str) -> Result<Option<Job>, JobQueueError>;

    /// Stage `media_timestamp` for a job previously read in this transaction.
    fn set_media_timestamp(&mut self, job_id: &str, media_timestamp: i64);

    async fn commit(&mut self) -> Result<(), JobQueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_camel_case() {
        let job = Job {
            id: "j1".into(),
            date_created: 107,
            media_timestamp: Some(105),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(json, r#"{"id":"j1","dateCreated":107,"mediaTimestamp":105}"#);
    }

    #[test]
    fn missing_media_timestamp_means_open() {
        let job: Job = serde_json::from_str(r#"{"id":"j2","dateCreated":5}"#).unwrap();
        assert!(!job.is_resolved());

        let job: Job =
            serde_json::from_str(r#"{"id":"j3","dateCreated":5,"mediaTimestamp":null}"#).unwrap();
        assert!(!job.is_resolved());
    }
}
