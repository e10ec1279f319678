// src/recorder/store_fs.rs
use crate::core::{Frame, StoreError};
use crate::recorder::FrameStore;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

// Suffix für temporäre Dateien, eindeutig pro Prozess
static PART_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Writes frames to `<base_dir>/<session>/<timestamp>.<ext>`.
///
/// Every write fills its own `.<pid>-<n>.part` file completely and then
/// renames it into place, so concurrent writers of one timestamp never share
/// a temp file and the final path only ever names a complete frame. The last
/// rename wins when the same timestamp is written twice.
pub struct FsFrameStore {
    base_dir: PathBuf,
}

impl FsFrameStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn frame_path(&self, session: &str, frame: &Frame) -> PathBuf {
        self.base_dir.join(session).join(frame.file_name())
    }

    /// Creates the session directory up front (the store also creates it
    /// lazily on first write).
    pub async fn prepare(&self, session: &str) -> std::io::Result<PathBuf> {
        let dir = self.base_dir.join(session);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

#[async_trait]
impl FrameStore for FsFrameStore {
    async fn write_frame(&self, session: &str, frame: &Frame) -> Result<PathBuf, StoreError> {
        let path = self.frame_path(session, frame);
        let part = path.with_extension(format!(
            "{}.{}-{}.part",
            frame.format.extension(),
            std::process::id(),
            PART_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));

        let io_err = |source: std::io::Error| StoreError::Io {
            timestamp: frame.timestamp,
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        fs::write(&part, &frame.payload).await.map_err(io_err)?;

        if let Err(e) = fs::rename(&part, &path).await {
            let _ = fs::remove_file(&part).await;
            return Err(io_err(e));
        }
        Ok(path)
    }
}
