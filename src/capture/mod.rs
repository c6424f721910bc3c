// Frame acquisition: one-shot sources and the continuous capture buffer

pub mod buffer;
pub mod error;
pub mod frame;
pub mod source;


pub use buffer::ContinuousCaptureBuffer;
pub use error::{CaptureError, CaptureResult};
pub use frame::Frame;
pub use source::{DeviceFrameSource, FrameSource};
