pub mod http;
pub mod mirror;

use async_trait::async_trait;

use crate::config::PublishConfig;
use crate::core::{Frame, PublishError};

pub use http::HttpPublisher;
pub use mirror::MirrorPublisher;

/// Remote object store receiving resolved frames.
#[async_trait]
pub trait FramePublisher: Send + Sync {
    /// Upload `frame` under `session`; returns the object location.
    async fn publish_frame(&self, session: &str, frame: &Frame) -> Result<String, PublishError>;
}

/// `frames/<session>/<timestamp>.<ext>`
pub fn object_key(session: &str, frame: &Frame) -> String {
    format!("frames/{}/{}", session, frame.file_name())
}

/// Publishes to every configured target in order. The first failure is
/// returned after all targets were attempted.
pub struct PublisherSet {
    targets: Vec<Box<dyn FramePublisher>>,
}

impl PublisherSet {
    pub fn new(targets: Vec<Box<dyn FramePublisher>>) -> Self {
        Self { targets }
    }

    pub fn from_config(cfg: &PublishConfig) -> Self {
        let mut targets: Vec<Box<dyn FramePublisher>> = Vec::new();
        if let Some(url) = &cfg.url {
            targets.push(Box::new(HttpPublisher::new(
                url,
                cfg.token.clone(),
                std::time::Duration::from_millis(cfg.timeout_ms),
            )));
        }
        if let Some(dir) = &cfg.mirror_dir {
            targets.push(Box::new(MirrorPublisher::new(dir.clone())));
        }
        if targets.is_empty() {
            log::warn!("[publish] no publish target configured, resolved frames stay local");
        }
        Self::new(targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl FramePublisher for PublisherSet {
    async fn publish_frame(&self, session: &str, frame: &Frame) -> Result<String, PublishError> {
        let mut first_err = None;
        let mut locations = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            match target.publish_frame(session, frame).await {
                Ok(location) => locations.push(location),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(locations.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameFormat;
    use crate::testing::mocks::RecordingPublisher;

    #[test]
    fn key_layout() {
        let frame = Frame::new(105, FrameFormat::Jpeg, vec![1]);
        assert_eq!(object_key("0xabc", &frame), "frames/0xabc/105.jpg");
    }

    #[tokio::test]
    async fn attempts_all_targets_and_reports_failure() {
        let failing = RecordingPublisher::new().fail_first(1);
        let ok = RecordingPublisher::new();
        let ok_log = ok.published_handle();
        let set = PublisherSet::new(vec![Box::new(failing), Box::new(ok)]);

        let frame = Frame::new(7, FrameFormat::Jpeg, vec![1]);
        assert!(set.publish_frame("s", &frame).await.is_err());
        assert_eq!(*ok_log.lock().unwrap(), vec![("s".to_string(), 7)]);
    }

    #[test]
    fn empty_config_has_no_targets() {
        assert!(PublisherSet::from_config(&PublishConfig::default()).is_empty());
    }
}
