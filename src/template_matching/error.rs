use std::path::PathBuf;
use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Template load failures. Never cached: the next load retries the decode.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to decode template {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Template {} decoded to an empty image", path.display())]
    Empty { path: PathBuf },
}

/// Reasons a single correlation query could not run. Callers see these as "no match".
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("Template {template_w}x{template_h} is larger than the search area {area_w}x{area_h}")]
    TemplateTooLarge {
        template_w: u32,
        template_h: u32,
        area_w: u32,
        area_h: u32,
    },

    #[error("Invalid scale factor {0}")]
    InvalidScale(f32),

    #[error("Search region lies outside the frame")]
    EmptyRegion,

    #[error("Template and frame channel counts differ ({template} vs {image})")]
    ChannelMismatch { template: usize, image: usize },
}
