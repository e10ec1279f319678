use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::timestamp::unix_now;
use crate::core::{CaptureError, Frame, FrameFormat};
use crate::producers::CaptureSource;

/// Re-reads a still image from disk on every capture, stamping it with the
/// current time. Picks up replacements of the file between ticks.
pub struct FileCapture {
    name: String,
    path: PathBuf,
    format: FrameFormat,
    last_len: Option<usize>,
}

impl FileCapture {
    pub fn new(path: PathBuf, format: FrameFormat) -> Self {
        Self {
            name: format!("file:{}", path.display()),
            path,
            format,
            last_len: None,
        }
    }
}

#[async_trait]
impl CaptureSource for FileCapture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            CaptureError::with_context(format!("reading {}", self.path.display()), e)
        })?;

        if data.is_empty() {
            return Err(CaptureError::EmptyFrame {
                source_name: self.name.clone(),
            });
        }

        if self.last_len != Some(data.len()) {
            log::debug!("[capture] {} now {} bytes", self.name, data.len());
            self.last_len = Some(data.len());
        }

        Ok(Frame::new(unix_now(), self.format, Bytes::from(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.jpg");
        std::fs::write(&path, b"jpeg-data").unwrap();

        let mut capture = FileCapture::new(path, FrameFormat::Jpeg);
        let frame = capture.capture_frame().await.unwrap();
        assert_eq!(frame.payload.as_ref(), b"jpeg-data");
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut capture = FileCapture::new(dir.path().join("absent.jpg"), FrameFormat::Jpeg);
        assert!(capture.capture_frame().await.is_err());
    }
}
