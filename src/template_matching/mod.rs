/// Template matching for locating UI elements in screenshots
///
/// - `TemplateCache` decodes reference images once per (path, colour mode)
/// - `Matcher` runs zero-mean normalized cross-correlation queries against a `Frame`
/// - `SearchRegion` restricts a query to part of the frame
pub mod cache;
pub mod config;
pub mod correlate;
pub mod error;
pub mod matcher;
pub mod region;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::{CacheInfo, FileDecoder, Template, TemplateCache, TemplateDecoder};
pub use config::{MatchConfig, create_game_object_config, create_ui_config};
pub use error::{MatchError, TemplateError, TemplateResult};
pub use matcher::Matcher;
pub use region::SearchRegion;
pub use types::{Anchor, ColorMode, MatchResult, MatchSet};
