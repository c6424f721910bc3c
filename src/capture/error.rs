use crate::device::DeviceError;
use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Why a single capture attempt produced no frame.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Device capture failed: {0}")]
    Device(#[from] DeviceError),

    #[error("Device returned an empty screenshot payload")]
    EmptyPayload,

    #[error("Failed to decode screenshot: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Decoded screenshot has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("Capture task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CaptureError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, CaptureError::Device(e) if e.is_disconnect())
    }
}
