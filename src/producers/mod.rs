pub mod capture_loop;
pub mod command;
pub mod fallback;
pub mod file;
pub mod synthetic;

use async_trait::async_trait;

use crate::config::{CaptureConfig, CaptureSourceKind};
use crate::core::{CaptureError, Frame};

pub use capture_loop::{FrameProducer, ProducerHandle, ProducerStatus};
pub use command::CommandCapture;
pub use fallback::FallbackCapture;
pub use file::FileCapture;
pub use synthetic::SyntheticCapture;

/// A frame source. Implementations own their device state, hence `&mut self`.
#[async_trait]
pub trait CaptureSource: Send {
    fn name(&self) -> &str;

    /// Grab one frame stamped with its capture time.
    async fn capture_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Builds the configured source, wrapped in a [`FallbackCapture`] when
/// `fallback_file` is set.
pub fn build_source(cfg: &CaptureConfig) -> anyhow::Result<Box<dyn CaptureSource>> {
    let primary: Box<dyn CaptureSource> = match cfg.source {
        CaptureSourceKind::Synthetic => Box::new(SyntheticCapture::new(
            "synthetic",
            cfg.width,
            cfg.height,
        )),
        CaptureSourceKind::Command => Box::new(CommandCapture::from_config(cfg)?),
        CaptureSourceKind::File => {
            let path = cfg
                .file
                .clone()
                .ok_or_else(|| anyhow::anyhow!("capture.file is required for file capture"))?;
            Box::new(FileCapture::new(path, cfg.format))
        }
    };

    match &cfg.fallback_file {
        Some(path) => {
            let fallback = FileCapture::new(path.clone(), cfg.format);
            Ok(Box::new(FallbackCapture::new(primary, Box::new(fallback))))
        }
        None => Ok(primary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_synthetic_by_default() {
        let cfg = CaptureConfig {
            width: 4,
            height: 2,
            ..CaptureConfig::default()
        };
        let mut source = build_source(&cfg).unwrap();
        assert_eq!(source.name(), "synthetic");
        let frame = source.capture_frame().await.unwrap();
        assert!(!frame.is_empty());
    }

    #[test]
    fn wraps_with_fallback_when_configured() {
        let cfg = CaptureConfig {
            fallback_file: Some("still.jpg".into()),
            ..CaptureConfig::default()
        };
        let source = build_source(&cfg).unwrap();
        assert_eq!(source.name(), "fallback");
    }

    #[test]
    fn command_source_needs_a_program() {
        let cfg = CaptureConfig {
            source: CaptureSourceKind::Command,
            ..CaptureConfig::default()
        };
        assert!(build_source(&cfg).is_err());
    }
}
