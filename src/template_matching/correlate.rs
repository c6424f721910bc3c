//! Zero-mean normalized cross-correlation score maps
//!
//! Scores follow the usual correlation-coefficient definition: the template and
//! every candidate window are mean-subtracted, then the dot product is divided by
//! the product of their norms. Negative correlation is clamped to 0 and flat
//! windows (or flat templates) score 0.
//!
//! The numerator is summed in integers against `n·T - ΣT` (the template scaled by
//! its pixel count and mean-subtracted), so it is exact for any contrast. Window
//! sums and sums of squares come from integral images, so the per-window
//! normalisation is O(1).
use super::error::MatchError;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{Extremes, find_extremes};

pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

type Integral = ImageBuffer<Luma<u64>, Vec<u64>>;

struct ChannelStats<'a> {
    plane: &'a GrayImage,
    /// `n·T - ΣT`, row-major
    kernel: Vec<i64>,
    sum: Integral,
    sum_sq: Integral,
}

/// Sum over the `w`x`h` window whose top-left is (x, y).
fn window_sum(integral: &Integral, x: u32, y: u32, w: u32, h: u32) -> u64 {
    let a = integral.get_pixel(x, y)[0];
    let b = integral.get_pixel(x + w, y)[0];
    let c = integral.get_pixel(x, y + h)[0];
    let d = integral.get_pixel(x + w, y + h)[0];
    (a + d) - (b + c)
}

/// `Σ I·(n·T - ΣT)` over the window at (x, y). Equals `n·ΣI·T - ΣI·ΣT` exactly.
fn window_cross(plane: &GrayImage, kernel: &[i64], tw: u32, x: u32, y: u32) -> i64 {
    let stride = plane.width() as usize;
    let raw = plane.as_raw();
    let (x, tw) = (x as usize, tw as usize);
    kernel
        .chunks_exact(tw)
        .enumerate()
        .map(|(row, weights)| {
            let start = (y as usize + row) * stride + x;
            raw[start..start + tw]
                .iter()
                .zip(weights)
                .map(|(&p, &k)| i64::from(p) * k)
                .sum::<i64>()
        })
        .sum()
}

/// Correlation score for every placement of `template` inside `image`.
///
/// Both slices hold one plane per channel (1 for grayscale, 3 for colour).
/// The score map is `(W - w + 1) x (H - h + 1)`; entry (x, y) scores the
/// placement whose top-left is (x, y).
pub fn score_map(image: &[GrayImage], template: &[GrayImage]) -> Result<ScoreMap, MatchError> {
    if image.is_empty() || image.len() != template.len() {
        return Err(MatchError::ChannelMismatch {
            template: template.len(),
            image: image.len(),
        });
    }
    let (iw, ih) = image[0].dimensions();
    let (tw, th) = template[0].dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return Err(MatchError::TemplateTooLarge {
            template_w: tw,
            template_h: th,
            area_w: iw,
            area_h: ih,
        });
    }

    let n = u64::from(tw) * u64::from(th);
    let mut template_var: u128 = 0;
    let stats: Vec<ChannelStats> = image
        .iter()
        .zip(template)
        .map(|(plane, tpl)| {
            let template_sum: u64 = tpl.pixels().map(|p| u64::from(p[0])).sum();
            let template_sq: u64 = tpl.pixels().map(|p| u64::from(p[0]).pow(2)).sum();
            template_var += (u128::from(n) * u128::from(template_sq))
                .saturating_sub(u128::from(template_sum).pow(2));
            let (n, template_sum) = (n as i64, template_sum as i64);
            ChannelStats {
                plane,
                kernel: tpl
                    .pixels()
                    .map(|p| n * i64::from(p[0]) - template_sum)
                    .collect(),
                sum: integral_image::<_, u64>(plane),
                sum_sq: integral_squared_image::<_, u64>(plane),
            }
        })
        .collect();

    let (out_w, out_h) = (iw - tw + 1, ih - th + 1);
    if template_var == 0 {
        return Ok(ScoreMap::new(out_w, out_h));
    }
    let template_var = template_var as f64;

    Ok(ScoreMap::from_fn(out_w, out_h, |x, y| {
        let mut numerator: i128 = 0;
        let mut window_var: u128 = 0;
        for channel in &stats {
            let sum = window_sum(&channel.sum, x, y, tw, th);
            let sum_sq = window_sum(&channel.sum_sq, x, y, tw, th);
            numerator += i128::from(window_cross(channel.plane, &channel.kernel, tw, x, y));
            window_var += (u128::from(n) * u128::from(sum_sq)).saturating_sub(u128::from(sum).pow(2));
        }
        if window_var == 0 || numerator <= 0 {
            return Luma([0.0]);
        }
        let score = numerator as f64 / (window_var as f64 * template_var).sqrt();
        Luma([score.clamp(0.0, 1.0) as f32])
    }))
}

/// Location and value of the highest score. Ties resolve to the first in row-major order.
pub fn best_location(map: &ScoreMap) -> ((u32, u32), f32) {
    let Extremes {
        max_value,
        max_value_location,
        ..
    } = find_extremes(map);
    (max_value_location, max_value)
}
