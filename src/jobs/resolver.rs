// src/jobs/resolver.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::Level;
use tokio::task::JoinHandle;

use crate::core::{ComponentLogger, FrameBuffer, LogContext, Shutdown, format_unix};
use crate::jobs::JobQueue;
use crate::publish::FramePublisher;
use crate::recorder::FrameStore;

/// What a single claim-and-resolve unit ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        job_id: String,
        target: i64,
        frame_timestamp: i64,
    },
    /// Job vanished or was already resolved when read.
    Skipped { job_id: String },
    Failed { job_id: String, error: String },
}

impl Resolution {
    pub fn job_id(&self) -> &str {
        match self {
            Resolution::Resolved { job_id, .. }
            | Resolution::Skipped { job_id }
            | Resolution::Failed { job_id, .. } => job_id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Polls the job queue and answers each open job with the closest buffered
/// frame. Cheap to clone; every spawned unit carries its own clone.
#[derive(Clone)]
pub struct JobResolver {
    queue: Arc<dyn JobQueue>,
    buffer: Arc<FrameBuffer>,
    store: Arc<dyn FrameStore>,
    publisher: Arc<dyn FramePublisher>,
    session: Arc<str>,
    batch_size: usize,
    interval: Duration,
    shutdown: Shutdown,
}

impl ComponentLogger for JobResolver {
    fn log_context(&self) -> LogContext {
        LogContext::new("Resolver", &self.session)
    }
}

impl JobResolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        buffer: Arc<FrameBuffer>,
        store: Arc<dyn FrameStore>,
        publisher: Arc<dyn FramePublisher>,
        session: &str,
        batch_size: usize,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            queue,
            buffer,
            store,
            publisher,
            session: Arc::from(session),
            batch_size: batch_size.max(1),
            interval,
            shutdown,
        }
    }

    /// One poll cycle: fetch open jobs and spawn one unit per job without
    /// waiting for any of them.
    pub async fn poll_once(&self) -> anyhow::Result<Vec<JoinHandle<Resolution>>> {
        let jobs = self
            .queue
            .fetch_unresolved(self.batch_size)
            .await
            .context("fetching unresolved jobs")?;

        if !jobs.is_empty() {
            self.debug(&format!("{} unresolved job(s) fetched", jobs.len()));
            self.trace_buffer(&self.buffer);
        }

        Ok(jobs
            .into_iter()
            .map(|job| {
                let unit = self.clone();
                tokio::spawn(async move { unit.resolve(&job.id).await })
            })
            .collect())
    }

    /// Claim-and-resolve unit for one job. Never returns an error: anything
    /// that goes wrong is logged with the job id and becomes `Failed`.
    pub async fn resolve(&self, job_id: &str) -> Resolution {
        match self.try_resolve(job_id).await {
            Ok(resolution) => resolution,
            Err(e) => {
                self.log_job(Level::Error, job_id, &format!("resolution failed: {:#}", e));
                Resolution::Failed {
                    job_id: job_id.to_string(),
                    error: format!("{:#}", e),
                }
            }
        }
    }

    async fn try_resolve(&self, job_id: &str) -> anyhow::Result<Resolution> {
        let started = Instant::now();

        let mut tx = self.queue.begin().await.context("beginning transaction")?;
        let job = match tx.read(job_id).await.context("reading job")? {
            Some(job) if !job.is_resolved() => job,
            Some(_) => {
                self.log_job(Level::Debug, job_id, "already resolved, skipping");
                return Ok(Resolution::Skipped {
                    job_id: job_id.to_string(),
                });
            }
            None => {
                self.log_job(Level::Debug, job_id, "job no longer exists, skipping");
                return Ok(Resolution::Skipped {
                    job_id: job_id.to_string(),
                });
            }
        };

        let target = job.date_created;
        let frame = self.buffer.closest_to(target)?;

        let latency = target.abs_diff(frame.timestamp);
        let found = format!(
            "target={} found={} ({}) latency={}s",
            target,
            frame.timestamp,
            format_unix(frame.timestamp),
            latency
        );
        let level = if latency > 0 { Level::Warn } else { Level::Info };
        self.log_job(level, job_id, &found);

        // Persisting and publishing are best effort; the claim still commits.
        if let Err(e) = self.store.write_frame(&self.session, &frame).await {
            self.log_job(Level::Error, job_id, &format!("frame write failed: {}", e));
        }
        if let Err(e) = self.publisher.publish_frame(&self.session, &frame).await {
            self.log_job(Level::Error, job_id, &format!("frame publish failed: {}", e));
        }

        tx.set_media_timestamp(&job.id, frame.timestamp);
        tx.commit().await.context("committing claim")?;

        self.log_job(
            Level::Info,
            job_id,
            &format!("resolved with frame {} in {:?}", frame.timestamp, started.elapsed()),
        );
        Ok(Resolution::Resolved {
            job_id: job.id,
            target,
            frame_timestamp: frame.timestamp,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.info(&format!(
            "polling every {:?} (batch size {})",
            self.interval, self.batch_size
        ));

        let mut spawned: u64 = 0;
        while !self.shutdown.is_triggered() {
            match self.poll_once().await {
                // detached; units finish on their own
                Ok(handles) => spawned += handles.len() as u64,
                Err(e) => self.error(&format!("poll cycle skipped: {:#}", e)),
            }
            self.shutdown.wait_timeout(self.interval).await;
        }

        self.info(&format!("stopped ({} resolution unit(s) spawned)", spawned));
        Ok(())
    }
}
