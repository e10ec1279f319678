use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

pub type BufferResult<T> = Result<T, BufferError>;

#[derive(Debug, Error)]
pub enum BufferError {
    /// `closest_to` was called before any frame was ever inserted.
    #[error("closest-match lookup on an empty frame buffer (target={target})")]
    Empty { target: i64 },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{message}")]
    Message { message: String },
    #[error("capture command '{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("capture source '{source_name}' produced an empty frame")]
    EmptyFrame { source_name: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl CaptureError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write frame {timestamp} to {path:?}: {source}")]
    Io {
        timestamp: i64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{message}")]
    Message { message: String },
}

impl StoreError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("upload of {key} rejected with status {status}: {body}")]
    Status { key: String, status: u16, body: String },
    #[error("upload of {key} failed: {message}")]
    Transport { key: String, message: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl PublishError {
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobQueueError {
    /// A job read inside the transaction changed before commit.
    #[error("transaction conflict on job '{job_id}'")]
    Conflict { job_id: String },
    #[error("job '{job_id}' was staged for update without being read in the transaction")]
    NotRead { job_id: String },
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl JobQueueError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
