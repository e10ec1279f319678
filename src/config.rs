use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::core::{ConfigError, FrameFormat};

// ---------- Buffer ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 120 }
    }
}

// ---------- Capture ----------
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSourceKind {
    #[default]
    Synthetic,
    Command,
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureSourceKind,
    pub interval_ms: u64,
    /// Program and arguments; stdout becomes the frame payload.
    pub command: Vec<String>,
    pub file: Option<PathBuf>,
    /// Alternate still image used when the primary source fails.
    pub fallback_file: Option<PathBuf>,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: FrameFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureSourceKind::Synthetic,
            interval_ms: 1000,
            command: Vec::new(),
            file: None,
            fallback_file: None,
            device: "/dev/video0".into(),
            width: 1280,
            height: 720,
            fps: 30,
            format: FrameFormat::Jpeg,
        }
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ---------- Checkpoint ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CheckpointConfig {
    pub interval_ms: u64,
    pub output_dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            output_dir: PathBuf::from("."),
        }
    }
}

impl CheckpointConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ---------- Jobs ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct JobsConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub spool_dir: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            batch_size: 250,
            spool_dir: PathBuf::from("jobs"),
        }
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------- Publish ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PublishConfig {
    /// Object store base URL; frames go to `<url>/frames/<session>/<ts>.<ext>`.
    pub url: Option<String>,
    pub token: Option<String>,
    /// Local directory mirroring the object store layout.
    pub mirror_dir: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            mirror_dir: None,
            timeout_ms: 10_000,
        }
    }
}

// ---------- Root ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Session / output key prefix.
    pub session: String,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    /// Directory receiving checkpoints and resolved frames for this session.
    pub fn session_dir(&self) -> PathBuf {
        self.checkpoint.output_dir.join(&self.session)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = self.session.trim();
        if session.is_empty() {
            return Err(ConfigError::message("session must not be empty"));
        }
        if session.contains(['/', '\\']) || session == "." || session == ".." {
            return Err(ConfigError::message(format!(
                "session '{}' must be a single path component",
                self.session
            )));
        }

        if self.buffer.capacity == 0 {
            return Err(ConfigError::message("buffer.capacity must be > 0"));
        }
        if self.capture.interval_ms == 0 {
            return Err(ConfigError::message("capture.interval_ms must be > 0"));
        }
        if self.checkpoint.interval_ms == 0 {
            return Err(ConfigError::message("checkpoint.interval_ms must be > 0"));
        }
        if self.jobs.poll_interval_ms == 0 {
            return Err(ConfigError::message("jobs.poll_interval_ms must be > 0"));
        }
        if self.jobs.batch_size == 0 {
            return Err(ConfigError::message("jobs.batch_size must be > 0"));
        }

        match self.capture.source {
            CaptureSourceKind::Command if self.capture.command.is_empty() => {
                return Err(ConfigError::message(
                    "capture.source = \"command\" requires capture.command",
                ));
            }
            CaptureSourceKind::File if self.capture.file.is_none() => {
                return Err(ConfigError::message(
                    "capture.source = \"file\" requires capture.file",
                ));
            }
            _ => {}
        }

        if let Some(url) = &self.publish.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::message(format!(
                    "publish.url '{}' must be an http(s) URL",
                    url
                )));
            }
        }

        Ok(())
    }
}
