use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;

use crate::core::JobQueueError;
use crate::core::lock::lock_mutex;
use crate::jobs::{Job, JobQueue, JobTransaction};

const JOB_EXT: &str = "json";

/// Directory-backed job queue: one `<id>.json` document per job.
///
/// External producers drop new job files into the directory. Commits are
/// serialised inside this process and compare every job read in the
/// transaction against its current file contents before replacing files via
/// write-to-temp + rename. Exclusivity across processes is not provided.
///
/// Every poll lists the whole directory. Files last seen holding a resolved
/// job are only parsed again once their modification time or size changes,
/// so resolved jobs cost one `stat` per poll. Open jobs are parsed on every
/// poll; operators should archive resolved files to keep listings short.
#[derive(Clone)]
pub struct SpoolJobQueue {
    dir: PathBuf,
    commit_lock: Arc<AsyncMutex<()>>,
    resolved: Arc<Mutex<HashMap<PathBuf, FileStamp>>>,
}

/// Modification time and length of a job file when it was last parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(metadata: &std::fs::Metadata) -> Option<Self> {
        Some(Self {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
        })
    }
}

impl SpoolJobQueue {
    pub async fn open(dir: PathBuf) -> Result<Self, JobQueueError> {
        fs::create_dir_all(&dir).await.map_err(|e| {
            JobQueueError::with_context(format!("creating spool {}", dir.display()), e)
        })?;
        Ok(Self {
            dir,
            commit_lock: Arc::new(AsyncMutex::new(())),
            resolved: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of resolved job files the next poll will skip without parsing.
    pub fn resolved_cached(&self) -> usize {
        lock_mutex(&self.resolved, "spool resolved cache").len()
    }

    fn is_cached_resolved(&self, path: &Path, stamp: Option<FileStamp>) -> bool {
        let cache = lock_mutex(&self.resolved, "spool resolved cache");
        stamp.is_some() && cache.get(path).copied() == stamp
    }

    fn remember(&self, path: PathBuf, stamp: Option<FileStamp>, resolved: bool) {
        let mut cache = lock_mutex(&self.resolved, "spool resolved cache");
        match stamp {
            Some(stamp) if resolved => {
                cache.insert(path, stamp);
            }
            _ => {
                cache.remove(&path);
            }
        }
    }

    /// Write a job document, as an external requester would.
    pub async fn submit(&self, job: &Job) -> Result<(), JobQueueError> {
        let path = job_path(&self.dir, &job.id)?;
        write_job(&path, job).await
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<Job>, JobQueueError> {
        read_job(&job_path(&self.dir, job_id)?).await
    }
}

fn job_path(dir: &Path, job_id: &str) -> Result<PathBuf, JobQueueError> {
    let valid = !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if !valid {
        return Err(JobQueueError::message(format!(
            "job id '{}' is not usable as a spool file name",
            job_id
        )));
    }
    Ok(dir.join(format!("{}.{}", job_id, JOB_EXT)))
}

async fn read_job(path: &Path) -> Result<Option<Job>, JobQueueError> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(JobQueueError::with_context(
                format!("reading {}", path.display()),
                e,
            ));
        }
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| JobQueueError::with_context(format!("parsing {}", path.display()), e))
}

async fn write_job(path: &Path, job: &Job) -> Result<(), JobQueueError> {
    let data = serde_json::to_vec_pretty(job)
        .map_err(|e| JobQueueError::with_context(format!("encoding job {}", job.id), e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)
        .await
        .map_err(|e| JobQueueError::with_context(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| JobQueueError::with_context(format!("replacing {}", path.display()), e))
}

#[async_trait]
impl JobQueue for SpoolJobQueue {
    async fn fetch_unresolved(&self, limit: usize) -> Result<Vec<Job>, JobQueueError> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            JobQueueError::with_context(format!("listing {}", self.dir.display()), e)
        })?;

        let mut jobs = Vec::new();
        let mut listed = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| JobQueueError::with_context("listing spool", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JOB_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            listed.insert(path.clone());

            let stamp = entry.metadata().await.ok().as_ref().and_then(FileStamp::of);
            if self.is_cached_resolved(&path, stamp) {
                continue;
            }

            match read_job(&path).await {
                Ok(Some(job)) if job.id != stem => {
                    self.remember(path.clone(), stamp, false);
                    log::warn!("[jobs] {} holds job id '{}', skipping", path.display(), job.id);
                }
                Ok(Some(job)) => {
                    self.remember(path, stamp, job.is_resolved());
                    if !job.is_resolved() {
                        jobs.push(job);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.remember(path, stamp, false);
                    log::warn!("[jobs] skipping unreadable job file: {}", e);
                }
            }
        }

        lock_mutex(&self.resolved, "spool resolved cache")
            .retain(|path, _| listed.contains(path));

        jobs.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn begin(&self) -> Result<Box<dyn JobTransaction>, JobQueueError> {
        Ok(Box::new(SpoolTransaction {
            dir: self.dir.clone(),
            commit_lock: self.commit_lock.clone(),
            seen: HashMap::new(),
            staged: Vec::new(),
        }))
    }
}

struct SpoolTransaction {
    dir: PathBuf,
    commit_lock: Arc<AsyncMutex<()>>,
    /// Document contents observed per job id.
    seen: HashMap<String, Option<Job>>,
    staged: Vec<(String, i64)>,
}

#[async_trait]
impl JobTransaction for SpoolTransaction {
    async fn read(&mut self, job_id: &str) -> Result<Option<Job>, JobQueueError> {
        let job = read_job(&job_path(&self.dir, job_id)?).await?;
        self.seen.insert(job_id.to_string(), job.clone());
        Ok(job)
    }

    fn set_media_timestamp(&mut self, job_id: &str, media_timestamp: i64) {
        self.staged.push((job_id.to_string(), media_timestamp));
    }

    async fn commit(&mut self) -> Result<(), JobQueueError> {
        let _guard = self.commit_lock.lock().await;

        for (job_id, seen) in &self.seen {
            let current = read_job(&job_path(&self.dir, job_id)?).await?;
            if current != *seen {
                return Err(JobQueueError::Conflict {
                    job_id: job_id.clone(),
                });
            }
        }

        let mut updated = Vec::with_capacity(self.staged.len());
        for (job_id, media_timestamp) in &self.staged {
            let job = match self.seen.get(job_id) {
                Some(Some(job)) => job,
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
            };
            let mut job = job.clone();
            job.media_timestamp = Some(*media_timestamp);
            updated.push(job);
        }

        for job in &updated {
            write_job(&job_path(&self.dir, &job.id)?, job).await?;
        }

        self.staged.clear();
        self.seen.clear();
        Ok(())
    }
}
