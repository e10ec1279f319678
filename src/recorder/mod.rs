// src/recorder/mod.rs

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::{Frame, StoreError};

/// Durable frame storage ("write to disk").
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Persist the full payload of `frame` under `session`, keyed by its
    /// timestamp. Returns where it was written.
    async fn write_frame(&self, session: &str, frame: &Frame) -> Result<PathBuf, StoreError>;
}

pub mod checkpoint;
pub mod store_fs;

pub use checkpoint::{CheckpointOutcome, Checkpointer};
pub use store_fs::FsFrameStore;
