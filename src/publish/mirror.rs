use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::{Frame, PublishError};
use crate::publish::{FramePublisher, object_key};

/// Copies frames into a local directory using the object-store key layout,
/// e.g. for a synced folder or a test bucket.
pub struct MirrorPublisher {
    root: PathBuf,
}

impl MirrorPublisher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl FramePublisher for MirrorPublisher {
    async fn publish_frame(&self, session: &str, frame: &Frame) -> Result<String, PublishError> {
        let path = self.root.join(object_key(session, frame));

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PublishError::with_context(format!("creating {}", dir.display()), e)
            })?;
        }
        tokio::fs::write(&path, &frame.payload)
            .await
            .map_err(|e| PublishError::with_context(format!("writing {}", path.display()), e))?;

        log::info!("[publish] frame mirrored: {}", path.display());
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameFormat;

    #[tokio::test]
    async fn mirrors_object_layout() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = MirrorPublisher::new(dir.path().to_path_buf());
        let frame = Frame::new(110, FrameFormat::Jpeg, b"abc".to_vec());

        publisher.publish_frame("sess", &frame).await.unwrap();

        let expected = dir.path().join("frames").join("sess").join("110.jpg");
        assert_eq!(std::fs::read(expected).unwrap(), b"abc");
    }
}
