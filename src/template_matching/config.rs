//! Configuration for template matching operations
use super::types::ColorMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Confidence threshold for template matching (0.0 to 1.0)
    pub threshold: f32,
    pub color_mode: ColorMode,
    /// Scale factors tried by the enhanced matcher, in order
    pub enhanced_scales: Vec<f32>,
    /// Enhanced matching stops at the first scale scoring at least this
    pub early_exit_score: f32,
    /// Threshold multiplier for the coarse pass of fast matching
    pub fast_relax_factor: f32,
    /// Resolution factor for the coarse pass of fast matching
    pub downsample_factor: f32,
    /// Multi-match exclusion radius as a fraction of the larger template side
    pub suppression_factor: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            color_mode: ColorMode::Grayscale,
            enhanced_scales: vec![1.0, 1.2],
            early_exit_score: 0.95,
            fast_relax_factor: 0.8,
            downsample_factor: 0.5,
            suppression_factor: 0.8,
        }
    }
}

/// Configuration preset for UI elements (buttons, menus)
pub fn create_ui_config() -> MatchConfig {
    MatchConfig {
        threshold: 0.9,
        enhanced_scales: vec![1.0],
        ..MatchConfig::default()
    }
}

/// Configuration preset for game objects (items, characters)
pub fn create_game_object_config() -> MatchConfig {
    MatchConfig {
        threshold: 0.75,
        color_mode: ColorMode::Color,
        enhanced_scales: vec![0.8, 0.9, 1.0, 1.1, 1.2],
        early_exit_score: 0.97,
        ..MatchConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.color_mode, ColorMode::Grayscale);
        assert_eq!(config.enhanced_scales, vec![1.0, 1.2]);
        assert_eq!(config.early_exit_score, 0.95);
        assert_eq!(config.suppression_factor, 0.8);
    }

    #[test]
    fn presets_differ_from_default() {
        assert!(create_ui_config().threshold > MatchConfig::default().threshold);
        assert!(create_game_object_config().enhanced_scales.len() > 2);
    }
}
