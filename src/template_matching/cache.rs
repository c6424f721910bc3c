// Reference images, decoded once per (path, colour mode)
use super::error::{TemplateError, TemplateResult};
use super::types::ColorMode;
use image::{DynamicImage, GrayImage, RgbImage};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Decoded pixels of a template in the colour mode it was loaded with.
#[derive(Debug, Clone)]
pub enum TemplatePixels {
    Gray(GrayImage),
    Color(RgbImage),
}

/// A named reference raster. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    name: String,
    pixels: TemplatePixels,
}

impl Template {
    pub fn from_gray(name: impl Into<String>, image: GrayImage) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            pixels: TemplatePixels::Gray(image),
        }
    }

    pub fn from_rgb(name: impl Into<String>, image: RgbImage) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            pixels: TemplatePixels::Color(image),
        }
    }

    fn from_decoded(path: &Path, decoded: DynamicImage, mode: ColorMode) -> TemplateResult<Self> {
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(TemplateError::Empty {
                path: path.to_path_buf(),
            });
        }
        let pixels = match mode {
            ColorMode::Grayscale => TemplatePixels::Gray(decoded.to_luma8()),
            ColorMode::Color => TemplatePixels::Color(decoded.to_rgb8()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            name: template_name(path),
            pixels,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem, used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.pixels {
            TemplatePixels::Gray(_) => ColorMode::Grayscale,
            TemplatePixels::Color(_) => ColorMode::Color,
        }
    }

    pub fn pixels(&self) -> &TemplatePixels {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match &self.pixels {
            TemplatePixels::Gray(img) => img.dimensions(),
            TemplatePixels::Color(img) => img.dimensions(),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn as_gray(&self) -> Cow<'_, GrayImage> {
        match &self.pixels {
            TemplatePixels::Gray(img) => Cow::Borrowed(img),
            TemplatePixels::Color(img) => Cow::Owned(image::imageops::grayscale(img)),
        }
    }

    pub fn as_rgb(&self) -> Cow<'_, RgbImage> {
        match &self.pixels {
            TemplatePixels::Color(img) => Cow::Borrowed(img),
            TemplatePixels::Gray(img) => {
                Cow::Owned(DynamicImage::ImageLuma8(img.clone()).to_rgb8())
            }
        }
    }
}

fn template_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Turns a template path into pixels. Swappable so decode counts can be observed.
pub trait TemplateDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> TemplateResult<DynamicImage>;
}

/// Reads templates from disk with the `image` codecs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl TemplateDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> TemplateResult<DynamicImage> {
        if !path.is_file() {
            return Err(TemplateError::NotFound {
                path: path.to_path_buf(),
            });
        }
        image::open(path).map_err(|source| TemplateError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Number of cached templates per colour mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheInfo {
    pub color: usize,
    pub grayscale: usize,
}

impl std::fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} color, {} grayscale templates cached",
            self.color, self.grayscale
        )
    }
}

type TemplateMap = RwLock<HashMap<PathBuf, Arc<Template>>>;

/// Unbounded memo of decoded templates keyed by (path, colour mode).
///
/// Read-mostly after warm-up; safe to share between tasks.
pub struct TemplateCache {
    decoder: Box<dyn TemplateDecoder>,
    color: TemplateMap,
    grayscale: TemplateMap,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::with_decoder(Box::new(FileDecoder))
    }

    pub fn with_decoder(decoder: Box<dyn TemplateDecoder>) -> Self {
        Self {
            decoder,
            color: RwLock::new(HashMap::new()),
            grayscale: RwLock::new(HashMap::new()),
        }
    }

    fn map(&self, mode: ColorMode) -> &TemplateMap {
        match mode {
            ColorMode::Color => &self.color,
            ColorMode::Grayscale => &self.grayscale,
        }
    }

    /// Return the cached template, decoding it on first use. Failures are not remembered.
    pub fn load(&self, path: impl AsRef<Path>, mode: ColorMode) -> TemplateResult<Arc<Template>> {
        let path = path.as_ref();
        let map = self.map(mode);

        if let Some(hit) = map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(Arc::clone(hit));
        }

        let decoded = self.decoder.decode(path)?;
        let template = Arc::new(Template::from_decoded(path, decoded, mode)?);
        log::debug!(
            "🖼️ Loaded template {} ({}x{}, {:?})",
            template.name(),
            template.width(),
            template.height(),
            mode
        );

        let mut cached = map.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cached.entry(path.to_path_buf()).or_insert(template),
        ))
    }

    /// Empty both colour and grayscale caches.
    pub fn clear(&self) {
        self.color
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.grayscale
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::debug!("🧹 Template cache cleared");
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            color: self.color.read().unwrap_or_else(PoisonError::into_inner).len(),
            grayscale: self
                .grayscale
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}
