/// Template matcher for locating reference images in captured frames
///
/// Four queries share the correlation primitive in `correlate`:
/// - `match_one`: best placement, optional ROI and template scale (top-left result)
/// - `match_one_enhanced`: best over several scales with early exit (centre result)
/// - `match_one_fast`: coarse pass on downsampled images, refined in a small ROI (top-left result)
/// - `match_all`: every placement above threshold, de-duplicated by exclusion radius (centre results)
use super::cache::Template;
use super::config::MatchConfig;
use super::correlate::{best_location, score_map};
use super::error::MatchError;
use super::region::SearchRegion;
use super::types::{ColorMode, MatchResult, MatchSet};
use crate::capture::Frame;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

const RESIZE_FILTER: FilterType = FilterType::Triangle;

type Planes = Vec<GrayImage>;

fn split_rgb(image: &RgbImage) -> Planes {
    (0..3)
        .map(|c| GrayImage::from_fn(image.width(), image.height(), |x, y| {
            image::Luma([image.get_pixel(x, y)[c]])
        }))
        .collect()
}

fn frame_planes(frame: &Frame, mode: ColorMode) -> Planes {
    match mode {
        ColorMode::Grayscale => vec![frame.to_luma()],
        ColorMode::Color => split_rgb(frame.image()),
    }
}

fn template_planes(template: &Template, mode: ColorMode) -> Planes {
    match mode {
        ColorMode::Grayscale => vec![template.as_gray().into_owned()],
        ColorMode::Color => split_rgb(&template.as_rgb()),
    }
}

fn dims(planes: &[GrayImage]) -> (u32, u32) {
    planes.first().map(|p| p.dimensions()).unwrap_or((0, 0))
}

fn scaled_len(len: u32, factor: f32) -> u32 {
    ((len as f32 * factor).round() as u32).max(1)
}

fn resize_planes(planes: &[GrayImage], factor: f32) -> Planes {
    planes
        .iter()
        .map(|p| {
            imageops::resize(
                p,
                scaled_len(p.width(), factor),
                scaled_len(p.height(), factor),
                RESIZE_FILTER,
            )
        })
        .collect()
}

fn crop_planes(planes: &[GrayImage], region: &SearchRegion) -> Planes {
    planes
        .iter()
        .map(|p| imageops::crop_imm(p, region.x, region.y, region.width, region.height).to_image())
        .collect()
}

fn valid_scale(scale: f32) -> Result<(), MatchError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(MatchError::InvalidScale(scale))
    }
}

/// Best placement of `template` in `image`, as a top-left result offset by `origin`.
fn best_placement(
    image: &[GrayImage],
    template: &[GrayImage],
    origin: (u32, u32),
) -> Result<MatchResult, MatchError> {
    let map = score_map(image, template)?;
    let ((x, y), score) = best_location(&map);
    let (tw, th) = dims(template);
    Ok(MatchResult::top_left(origin.0 + x, origin.1 + y, score, tw, th))
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatchConfig,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Best single match, optionally restricted to `roi` and with the template rescaled by `scale`.
    ///
    /// Returns the top-left corner in full-frame coordinates, or `None` below `threshold`.
    pub fn match_one(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        color_mode: ColorMode,
        roi: Option<&SearchRegion>,
        scale: f32,
    ) -> Option<MatchResult> {
        match self.try_match_one(frame, template, color_mode, roi, scale) {
            Ok(found) if found.confidence >= threshold => {
                log::debug!("🎯 {} found at {found}", template.name());
                Some(found)
            }
            Ok(best) => {
                log::trace!("{} best {best} below {threshold:.2}", template.name());
                None
            }
            Err(e) => {
                log::warn!("⚠️ Matching {} failed: {e}", template.name());
                None
            }
        }
    }

    fn try_match_one(
        &self,
        frame: &Frame,
        template: &Template,
        color_mode: ColorMode,
        roi: Option<&SearchRegion>,
        scale: f32,
    ) -> Result<MatchResult, MatchError> {
        valid_scale(scale)?;
        let mut image = frame_planes(frame, color_mode);
        let mut origin = (0, 0);
        if let Some(roi) = roi {
            let region = roi.clamp_to(frame.width(), frame.height());
            if !region.is_valid() {
                return Err(MatchError::EmptyRegion);
            }
            image = crop_planes(&image, &region);
            origin = (region.x, region.y);
        }

        let mut tpl = template_planes(template, color_mode);
        if scale != 1.0 {
            tpl = resize_planes(&tpl, scale);
        }
        best_placement(&image, &tpl, origin)
    }

    /// Multi-scale grayscale match. Returns the centre of the best placement over `scales`.
    ///
    /// Stops at the first scale whose score reaches the configured early-exit score.
    pub fn match_one_enhanced(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        scales: &[f32],
    ) -> Option<MatchResult> {
        let image = frame_planes(frame, ColorMode::Grayscale);
        let base = template_planes(template, ColorMode::Grayscale);
        let mut best: Option<MatchResult> = None;

        for &scale in scales {
            if let Err(e) = valid_scale(scale) {
                log::warn!("⚠️ Matching {} failed: {e}", template.name());
                continue;
            }
            let tpl = if scale == 1.0 {
                base.clone()
            } else {
                resize_planes(&base, scale)
            };
            let candidate = match best_placement(&image, &tpl, (0, 0)) {
                Ok(candidate) => candidate,
                Err(e) => {
                    log::debug!("{} skipped at scale {scale}: {e}", template.name());
                    continue;
                }
            };
            if candidate.confidence < threshold {
                continue;
            }

            let early_exit = candidate.confidence >= self.config.early_exit_score;
            if best
                .as_ref()
                .is_none_or(|b| candidate.confidence > b.confidence)
            {
                best = Some(candidate);
            }
            if early_exit {
                log::debug!("{} early exit at scale {scale}", template.name());
                break;
            }
        }

        let found = best?.into_center();
        log::debug!("🎯 {} found at {found} (enhanced)", template.name());
        Some(found)
    }

    /// Coarse-to-fine grayscale match. Without a downsample factor in (0, 1) this is a
    /// plain full-resolution `match_one`.
    pub fn match_one_fast(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        downsample: Option<f32>,
    ) -> Option<MatchResult> {
        let Some(factor) = downsample.filter(|f| *f > 0.0 && *f < 1.0) else {
            return self.match_one(frame, template, threshold, ColorMode::Grayscale, None, 1.0);
        };

        match self.try_match_fast(frame, template, threshold, factor) {
            Ok(found) => {
                let found = found?;
                log::debug!("🎯 {} found at {found} (fast)", template.name());
                Some(found)
            }
            Err(e) => {
                log::warn!("⚠️ Matching {} failed: {e}", template.name());
                None
            }
        }
    }

    fn try_match_fast(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        factor: f32,
    ) -> Result<Option<MatchResult>, MatchError> {
        let image = frame_planes(frame, ColorMode::Grayscale);
        let tpl = template_planes(template, ColorMode::Grayscale);

        let coarse = best_placement(
            &resize_planes(&image, factor),
            &resize_planes(&tpl, factor),
            (0, 0),
        )?;
        if coarse.confidence < threshold * self.config.fast_relax_factor {
            return Ok(None);
        }

        let approx_x = (coarse.x as f32 / factor) as u32;
        let approx_y = (coarse.y as f32 / factor) as u32;
        let (tw, th) = template.dimensions();
        let margin = tw.max(th);
        let roi_x = approx_x.saturating_sub(margin / 2).min(frame.width());
        let roi_y = approx_y.saturating_sub(margin / 2).min(frame.height());
        let region = SearchRegion::new(
            roi_x,
            roi_y,
            (frame.width() - roi_x).min(margin * 2),
            (frame.height() - roi_y).min(margin * 2),
        );
        if !region.is_valid() {
            return Err(MatchError::EmptyRegion);
        }

        let refined = best_placement(&crop_planes(&image, &region), &tpl, (region.x, region.y))?;
        Ok((refined.confidence >= threshold).then_some(refined))
    }

    /// Every non-duplicate placement scoring at least `threshold`, centre-anchored,
    /// highest confidence first.
    pub fn match_all(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        color_mode: ColorMode,
    ) -> MatchSet {
        let image = frame_planes(frame, color_mode);
        let tpl = template_planes(template, color_mode);
        let map = match score_map(&image, &tpl) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("⚠️ Matching {} failed: {e}", template.name());
                return MatchSet::default();
            }
        };

        let (tw, th) = dims(&tpl);
        let mut candidates: Vec<MatchResult> = map
            .enumerate_pixels()
            .filter(|(_, _, score)| score[0] >= threshold)
            .map(|(x, y, score)| MatchResult::top_left(x, y, score[0], tw, th).into_center())
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let radius = self.config.suppression_factor * tw.max(th) as f32;
        let matches = suppress(candidates, radius);
        log::debug!(
            "🎯 {} matched {} time(s) at {threshold:.2}",
            template.name(),
            matches.len()
        );
        MatchSet::new(matches)
    }
}

/// Greedy exclusion: keep a candidate only if it is farther than `radius` from every kept one.
/// `candidates` must be sorted best first.
fn suppress(candidates: Vec<MatchResult>, radius: f32) -> Vec<MatchResult> {
    let radius_sq = radius * radius;
    let mut kept: Vec<MatchResult> = Vec::new();
    for candidate in candidates {
        let isolated = kept.iter().all(|k| {
            let dx = k.x as f32 - candidate.x as f32;
            let dy = k.y as f32 - candidate.y as f32;
            dx * dx + dy * dy > radius_sq
        });
        if isolated {
            kept.push(candidate);
        }
    }
    kept
}
