use async_trait::async_trait;

use crate::core::{CaptureError, Frame};
use crate::producers::CaptureSource;

/// Captures from `primary`, switching to `fallback` for any tick on which the
/// primary fails. Only when both fail does the error surface.
pub struct FallbackCapture {
    primary: Box<dyn CaptureSource>,
    fallback: Box<dyn CaptureSource>,
    on_fallback: bool,
}

impl FallbackCapture {
    pub fn new(primary: Box<dyn CaptureSource>, fallback: Box<dyn CaptureSource>) -> Self {
        Self {
            primary,
            fallback,
            on_fallback: false,
        }
    }

    pub fn is_on_fallback(&self) -> bool {
        self.on_fallback
    }
}

#[async_trait]
impl CaptureSource for FallbackCapture {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        match self.primary.capture_frame().await {
            Ok(frame) => {
                if self.on_fallback {
                    log::info!("[capture] {} recovered", self.primary.name());
                    self.on_fallback = false;
                }
                Ok(frame)
            }
            Err(primary_err) => {
                if !self.on_fallback {
                    log::warn!(
                        "[capture] {} failed ({}), using {}",
                        self.primary.name(),
                        primary_err,
                        self.fallback.name()
                    );
                    self.on_fallback = true;
                }
                self.fallback.capture_frame().await.map_err(|fallback_err| {
                    CaptureError::message(format!(
                        "{} failed: {}; fallback {} failed: {}",
                        self.primary.name(),
                        primary_err,
                        self.fallback.name(),
                        fallback_err
                    ))
                })
            }
        }
    }
}
