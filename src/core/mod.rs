pub mod error;
pub mod frame;
pub mod frame_buffer;
pub mod lock;
pub mod logging;
pub mod shutdown;
pub mod timestamp;

pub use error::{BufferError, CaptureError, ConfigError, JobQueueError, PublishError, StoreError};
pub use frame::{Frame, FrameFormat};
pub use frame_buffer::{FrameBuffer, FrameBufferStats};
pub use logging::{ComponentLogger, LogContext};
pub use shutdown::Shutdown;
pub use timestamp::*;
