use async_trait::async_trait;
use bytes::{BufMut, BytesMut};

use crate::core::timestamp::unix_now;
use crate::core::{CaptureError, Frame, FrameFormat};
use crate::producers::CaptureSource;

/// Generates a PPM test pattern: a dark field with a white bar whose row
/// follows the seconds of the capture time. Useful without a camera.
pub struct SyntheticCapture {
    name: String,
    width: u32,
    height: u32,
    frames: u64,
}

impl SyntheticCapture {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width: width.max(1),
            height: height.max(1),
            frames: 0,
        }
    }

    fn render(&self, timestamp: i64) -> BytesMut {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let pixels = self.width as usize * self.height as usize * 3;
        let mut buf = BytesMut::with_capacity(header.len() + pixels);
        buf.put_slice(header.as_bytes());

        let second = timestamp.rem_euclid(60) as u32;
        let bar_row = second * self.height / 60;
        let bar_height = (self.height / 60).max(1);
        for row in 0..self.height {
            let value = if row >= bar_row && row < bar_row + bar_height {
                0xff
            } else {
                0x10
            };
            buf.put_bytes(value, self.width as usize * 3);
        }
        buf
    }
}

#[async_trait]
impl CaptureSource for SyntheticCapture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let timestamp = unix_now();
        let payload = self.render(timestamp).freeze();
        self.frames += 1;
        if self.frames == 1 {
            log::info!(
                "[capture] synthetic source '{}' rendering {}x{}",
                self.name,
                self.width,
                self.height
            );
        }
        Ok(Frame::new(timestamp, FrameFormat::Ppm, payload))
    }
}
