use super::error::{CaptureError, CaptureResult};
use super::frame::Frame;
use crate::device::{DeviceControl, DeviceError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces one decoded frame per call.
///
/// Callers serialise access: the continuous-capture worker is the only caller
/// while it runs, direct calls are a fallback for when it is disabled.
pub trait FrameSource: Send + Sync + 'static {
    fn capture(&self) -> impl Future<Output = CaptureResult<Frame>> + Send;
}

/// Screenshots a device through its `screencap` output.
pub struct DeviceFrameSource<D> {
    device: Arc<D>,
    captured: AtomicU64,
}

impl<D: DeviceControl> DeviceFrameSource<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            captured: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Frames decoded so far.
    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::SeqCst)
    }
}

impl<D: DeviceControl> FrameSource for DeviceFrameSource<D> {
    async fn capture(&self) -> CaptureResult<Frame> {
        let connection = self.device.connection();
        if !connection.is_alive() {
            if !self.device.check_connection().await {
                return Err(DeviceError::NotConnected {
                    serial: connection.serial().to_string(),
                }
                .into());
            }
            connection.mark_alive();
        }

        let bytes = match self.device.capture_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.is_disconnect() && connection.mark_lost() {
                    log::warn!("🔌 Capture: lost {} ({e})", connection.serial());
                }
                return Err(e.into());
            }
        };
        if bytes.is_empty() {
            return Err(CaptureError::EmptyPayload);
        }

        let index = self.captured.fetch_add(1, Ordering::SeqCst);
        let frame = tokio::task::spawn_blocking(move || Frame::decode(&bytes, index)).await??;
        log::debug!(
            "📸 Captured frame #{} ({}x{})",
            frame.index(),
            frame.width(),
            frame.height()
        );
        Ok(frame)
    }
}
