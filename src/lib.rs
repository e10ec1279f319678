// src/lib.rs
pub mod config;
pub mod core;
pub mod jobs;
pub mod producers;
pub mod publish;
pub mod recorder;
pub mod session;
pub mod testing;

// Re-export die wichtigsten Typen
pub use crate::config::Config;
pub use crate::core::{ComponentLogger, Frame, FrameBuffer, FrameFormat, LogContext, Shutdown};
pub use crate::jobs::{Job, JobQueue, JobResolver, JobTransaction, Resolution};
pub use crate::session::{Session, run_session};
