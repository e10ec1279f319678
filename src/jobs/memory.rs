use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::JobQueueError;
use crate::core::lock::lock_mutex;
use crate::jobs::{Job, JobQueue, JobTransaction};

#[derive(Default)]
struct QueueState {
    jobs: BTreeMap<String, VersionedJob>,
    commits: u64,
}

struct VersionedJob {
    job: Job,
    version: u64,
}

/// In-process job queue with versioned, optimistic transactions.
#[derive(Clone, Default)]
pub struct MemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a job, as an external writer would.
    pub fn insert(&self, job: Job) {
        let mut state = lock_mutex(&self.state, "MemoryJobQueue::insert");
        let version = state.jobs.get(&job.id).map(|v| v.version + 1).unwrap_or(1);
        state
            .jobs
            .insert(job.id.clone(), VersionedJob { job, version });
    }

    pub fn remove(&self, job_id: &str) -> Option<Job> {
        lock_mutex(&self.state, "MemoryJobQueue::remove")
            .jobs
            .remove(job_id)
            .map(|v| v.job)
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        lock_mutex(&self.state, "MemoryJobQueue::get")
            .jobs
            .get(job_id)
            .map(|v| v.job.clone())
    }

    /// Number of commits that applied at least one update.
    pub fn commits(&self) -> u64 {
        lock_mutex(&self.state, "MemoryJobQueue::commits").commits
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn fetch_unresolved(&self, limit: usize) -> Result<Vec<Job>, JobQueueError> {
        let state = lock_mutex(&self.state, "MemoryJobQueue::fetch_unresolved");
        Ok(state
            .jobs
            .values()
            .filter(|v| !v.job.is_resolved())
            .take(limit)
            .map(|v| v.job.clone())
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn JobTransaction>, JobQueueError> {
        Ok(Box::new(MemoryTransaction {
            state: self.state.clone(),
            seen: HashMap::new(),
            staged: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<QueueState>>,
    /// Version observed per job id; `None` if the job did not exist.
    seen: HashMap<String, Option<u64>>,
    staged: Vec<(String, i64)>,
}

#[async_trait]
impl JobTransaction for MemoryTransaction {
    async fn read(&mut self, job_id: &str) -> Result<Option<Job>, JobQueueError> {
        let state = lock_mutex(&self.state, "MemoryTransaction::read");
        let entry = state.jobs.get(job_id);
        self.seen
            .insert(job_id.to_string(), entry.map(|v| v.version));
        Ok(entry.map(|v| v.job.clone()))
    }

    fn set_media_timestamp(&mut self, job_id: &str, media_timestamp: i64) {
        self.staged.push((job_id.to_string(), media_timestamp));
    }

    async fn commit(&mut self) -> Result<(), JobQueueError> {
        let mut state = lock_mutex(&self.state, "MemoryTransaction::commit");

        for (job_id, seen_version) in &self.seen {
            let current = state.jobs.get(job_id).map(|v| v.version);
            if current != *seen_version {
                return Err(JobQueueError::Conflict {
                    job_id: job_id.clone(),
                });
            }
        }

        for (job_id, _) in &self.staged {
            match self.seen.get(job_id) {
                Some(Some(_)) => {}
                Some(None) => {
                    return Err(JobQueueError::Conflict {
                        job_id: job_id.clone(),
                    });
                }
                None => {
                    return Err(JobQueueError::NotRead {
                        job_id: job_id.clone(),
                    });
                }
            }
        }

        if self.staged.is_empty() {
            return Ok(());
        }

        for (job_id, media_timestamp) in self.staged.drain(..) {
            if let Some(entry) = state.jobs.get_mut(&job_id) {
                entry.job.media_timestamp = Some(media_timestamp);
                entry.version += 1;
            }
        }
        state.commits += 1;
        self.seen.clear();
        Ok(())
    }
}
