use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Encoding of a captured payload. Only used to pick file extensions and
/// content types; payload bytes are never decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    #[default]
    Jpeg,
    Png,
    Ppm,
}

impl FrameFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpg",
            FrameFormat::Png => "png",
            FrameFormat::Ppm => "ppm",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "image/jpeg",
            FrameFormat::Png => "image/png",
            FrameFormat::Ppm => "image/x-portable-pixmap",
        }
    }
}

/// A captured frame. Cloning only bumps the payload refcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: i64,
    pub format: FrameFormat,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(timestamp: i64, format: FrameFormat, payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            format,
            payload: payload.into(),
        }
    }

    /// `<timestamp>.<ext>`, the name used by every store and publisher.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.timestamp, self.format.extension())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
