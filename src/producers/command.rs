use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::CaptureConfig;
use crate::core::timestamp::unix_now;
use crate::core::{CaptureError, Frame, FrameFormat};
use crate::producers::CaptureSource;

/// Runs an external grabber once per frame and takes its stdout as the
/// encoded payload, e.g.
/// `ffmpeg -f v4l2 -video_size {width}x{height} -i {device} -frames:v 1 -f mjpeg -`.
///
/// `{width}`, `{height}`, `{fps}` and `{device}` in the arguments are
/// substituted once at construction.
pub struct CommandCapture {
    name: String,
    program: String,
    args: Vec<String>,
    format: FrameFormat,
}

impl CommandCapture {
    pub fn new(program: &str, args: Vec<String>, format: FrameFormat) -> Self {
        Self {
            name: format!("command:{}", program),
            program: program.to_string(),
            args,
            format,
        }
    }

    pub fn from_config(cfg: &CaptureConfig) -> anyhow::Result<Self> {
        let (program, args) = cfg
            .command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("capture.command must name a program"))?;

        let args = args
            .iter()
            .map(|arg| {
                arg.replace("{width}", &cfg.width.to_string())
                    .replace("{height}", &cfg.height.to_string())
                    .replace("{fps}", &cfg.fps.to_string())
                    .replace("{device}", &cfg.device)
            })
            .collect();

        log::info!(
            "[capture] requested {}x{} at {} fps from {}",
            cfg.width,
            cfg.height,
            cfg.fps,
            cfg.device
        );

        Ok(Self::new(program, args, cfg.format))
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl CaptureSource for CommandCapture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptureError::with_context(format!("spawning {}", self.program), e))?;

        // Zeitstempel erst nach erfolgreichem Grab
        let timestamp = unix_now();

        if !output.status.success() {
            return Err(CaptureError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::EmptyFrame {
                source_name: self.name.clone(),
            });
        }

        Ok(Frame::new(timestamp, self.format, output.stdout))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders() {
        let cfg = CaptureConfig {
            command: vec![
                "grab".into(),
                "{width}x{height}".into(),
                "-r".into(),
                "{fps}".into(),
                "{device}".into(),
            ],
            width: 640,
            height: 480,
            fps: 15,
            device: "/dev/video2".into(),
            ..CaptureConfig::default()
        };
        let capture = CommandCapture::from_config(&cfg).unwrap();
        assert_eq!(capture.name(), "command:grab");
        assert_eq!(capture.args(), ["640x480", "-r", "15", "/dev/video2"]);
    }

    #[tokio::test]
    async fn stdout_becomes_payload() {
        let mut capture = CommandCapture::new(
            "sh",
            vec!["-c".into(), "printf frame-bytes".into()],
            FrameFormat::Jpeg,
        );
        let frame = capture.capture_frame().await.unwrap();
        assert_eq!(frame.payload.as_ref(), b"frame-bytes");
        assert_eq!(frame.format, FrameFormat::Jpeg);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let mut capture = CommandCapture::new(
            "sh",
            vec!["-c".into(), "echo no device >&2; exit 3".into()],
            FrameFormat::Jpeg,
        );
        match capture.capture_frame().await {
            Err(CaptureError::CommandFailed { stderr, .. }) => assert_eq!(stderr, "no device"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        let mut capture = CommandCapture::new("true", Vec::new(), FrameFormat::Jpeg);
        assert!(matches!(
            capture.capture_frame().await,
            Err(CaptureError::EmptyFrame { .. })
        ));
    }
}
