use super::error::{CaptureError, CaptureResult};
use image::{GrayImage, RgbImage};
use std::sync::Arc;

/// One decoded screenshot. Pixels are shared read-only between clones.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    index: u64,
}

impl Frame {
    /// Wrap a raster, rejecting zero-sized images. `index` is the capture sequence number.
    pub fn new(image: RgbImage, index: u64) -> CaptureResult<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::ZeroSize { width, height });
        }
        Ok(Self {
            image: Arc::new(image),
            index,
        })
    }

    /// Decode an encoded screenshot (PNG from `screencap -p`, or anything `image` can guess).
    pub fn decode(bytes: &[u8], index: u64) -> CaptureResult<Self> {
        if bytes.is_empty() {
            return Err(CaptureError::EmptyPayload);
        }
        let decoded = image::load_from_memory(bytes)?;
        Self::new(decoded.to_rgb8(), index)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn to_luma(&self) -> GrayImage {
        image::imageops::grayscale(self.image.as_ref())
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> CaptureResult<()> {
        self.image.save(path)?;
        Ok(())
    }
}
