use super::*;
use crate::testing::{block_icon, compose, encode_png, frame};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn icon_template(seed: u64) -> Template {
    Template::from_rgb(format!("icon-{seed}"), block_icon(seed, 40, 40))
}

fn matcher() -> Matcher {
    Matcher::new(MatchConfig::default())
}

#[test]
fn self_match_reports_known_offset() {
    let icon = block_icon(1, 40, 40);
    let frame = frame(compose(240, 160, &[(&icon, 104, 60)]));
    let template = Template::from_rgb("icon", icon);

    let found = matcher()
        .match_one(&frame, &template, 0.999, ColorMode::Grayscale, None, 1.0)
        .expect("icon should be found");
    assert_eq!(found.position(), (104, 60));
    assert_eq!(found.anchor, Anchor::TopLeft);
    assert!(found.confidence >= 0.999, "score {}", found.confidence);
    assert_eq!(found.center(), (124, 80));
}

#[test]
fn self_match_in_color_mode() {
    let icon = block_icon(2, 40, 40);
    let frame = frame(compose(200, 120, &[(&icon, 20, 44)]));
    let template = Template::from_rgb("icon", icon);

    let found = matcher()
        .match_one(&frame, &template, 0.99, ColorMode::Color, None, 1.0)
        .expect("icon should be found");
    assert_eq!(found.position(), (20, 44));
    assert!(found.confidence >= 0.999);
}

/// Grey glyph whose values only span `lo..lo + span`, on a background of `lo`.
fn faint_icon(seed: u64, size: u32, lo: u8, span: u8) -> RgbImage {
    let texture = block_icon(seed, size, size);
    RgbImage::from_fn(size, size, |x, y| {
        let v = lo + texture.get_pixel(x, y)[0] % span;
        image::Rgb([v, v, v])
    })
}

#[test]
fn faint_icon_on_bright_background() {
    let icon = faint_icon(6, 40, 200, 12);
    let mut screen = RgbImage::from_pixel(400, 300, image::Rgb([200, 200, 200]));
    image::imageops::replace(&mut screen, &icon, 50, 60);
    let frame = frame(screen);
    let template = Template::from_rgb("faint", icon);
    let m = matcher();

    let found = m
        .match_one(&frame, &template, 0.999, ColorMode::Grayscale, None, 1.0)
        .expect("faint icon should be found");
    assert_eq!(found.position(), (50, 60));

    let all = m.match_all(&frame, &template, 0.95, ColorMode::Grayscale);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].position(), (70, 80));

    let absent = Template::from_rgb("other", faint_icon(7, 40, 200, 12));
    assert!(m.match_one(&frame, &absent, 0.95, ColorMode::Grayscale, None, 1.0).is_none());
}

#[test]
fn threshold_monotonicity() {
    let icon = block_icon(3, 40, 40);
    let mut noisy = compose(200, 120, &[(&icon, 80, 40)]);
    // Perturb a few pixels so the best score sits below 1.0
    for x in 80..90 {
        noisy.put_pixel(x, 45, image::Rgb([255, 255, 255]));
    }
    let frame = frame(noisy);
    let template = Template::from_rgb("icon", icon);
    let m = matcher();

    let strict = m
        .match_one(&frame, &template, 0.9, ColorMode::Grayscale, None, 1.0)
        .expect("found at 0.9");
    for threshold in [0.85, 0.7, 0.5, 0.1, 0.0] {
        let relaxed = m
            .match_one(&frame, &template, threshold, ColorMode::Grayscale, None, 1.0)
            .expect("found at lower threshold");
        assert_eq!(relaxed, strict);
    }
    assert!(
        m.match_one(&frame, &template, strict.confidence + 1e-4, ColorMode::Grayscale, None, 1.0)
            .is_none()
    );
}

#[test]
fn no_match_for_absent_template() {
    let frame = frame(compose(240, 160, &[(&block_icon(4, 40, 40), 100, 60)]));
    let other = icon_template(5);
    let m = matcher();

    assert!(m.match_one(&frame, &other, 0.95, ColorMode::Grayscale, None, 1.0).is_none());
    assert!(m.match_all(&frame, &other, 0.95, ColorMode::Grayscale).is_empty());
}

#[test]
fn roi_restricts_search_and_translates_coordinates() {
    let icon = block_icon(6, 40, 40);
    let frame = frame(compose(400, 200, &[(&icon, 40, 80), (&icon, 300, 80)]));
    let template = Template::from_rgb("icon", icon);
    let m = matcher();

    let right = SearchRegion::new(260, 40, 140, 160);
    let found = m
        .match_one(&frame, &template, 0.95, ColorMode::Grayscale, Some(&right), 1.0)
        .expect("found in ROI");
    assert_eq!(found.position(), (300, 80));

    let empty_area = SearchRegion::new(120, 0, 120, 200);
    assert!(
        m.match_one(&frame, &template, 0.95, ColorMode::Grayscale, Some(&empty_area), 1.0)
            .is_none()
    );

    let outside = SearchRegion::new(500, 0, 50, 50);
    assert!(
        m.match_one(&frame, &template, 0.0, ColorMode::Grayscale, Some(&outside), 1.0)
            .is_none()
    );
}

#[test]
fn roi_smaller_than_template_is_no_match() {
    let icon = block_icon(7, 40, 40);
    let frame = frame(compose(200, 200, &[(&icon, 40, 40)]));
    let template = Template::from_rgb("icon", icon);
    let tiny = SearchRegion::new(40, 40, 20, 20);
    assert!(
        matcher()
            .match_one(&frame, &template, 0.0, ColorMode::Grayscale, Some(&tiny), 1.0)
            .is_none()
    );
}

#[test]
fn scale_larger_than_frame_is_rejected() {
    let icon = block_icon(8, 40, 40);
    let frame = frame(compose(60, 60, &[(&icon, 10, 10)]));
    let template = Template::from_rgb("icon", icon);
    let m = matcher();

    assert!(m.match_one(&frame, &template, 0.0, ColorMode::Grayscale, None, 2.0).is_none());
    assert!(m.match_one(&frame, &template, 0.0, ColorMode::Grayscale, None, 0.0).is_none());
    assert!(m.match_one(&frame, &template, 0.0, ColorMode::Grayscale, None, f32::NAN).is_none());
    assert!(m.match_one(&frame, &template, 0.99, ColorMode::Grayscale, None, 1.0).is_some());
}

#[test]
fn enhanced_finds_scaled_icon_and_reports_center() {
    let icon = block_icon(9, 40, 40);
    let scaled = image::imageops::resize(&icon, 48, 48, image::imageops::FilterType::Triangle);
    let frame = frame(compose(320, 200, &[(&scaled, 200, 100)]));
    let template = Template::from_rgb("icon", icon);

    let found = matcher()
        .match_one_enhanced(&frame, &template, 0.9, &[1.0, 1.2])
        .expect("scaled icon should be found");
    assert_eq!(found.anchor, Anchor::Center);
    assert_eq!((found.width, found.height), (48, 48));
    assert!(found.x.abs_diff(224) <= 1 && found.y.abs_diff(124) <= 1);
    assert!(found.confidence >= 0.9);
}

#[test]
fn enhanced_exits_early_on_near_perfect_score() {
    let icon = block_icon(10, 40, 40);
    let frame = frame(compose(240, 160, &[(&icon, 60, 60)]));
    let template = Template::from_rgb("icon", icon);

    let found = matcher()
        .match_one_enhanced(&frame, &template, 0.8, &[1.0, 1.2])
        .expect("icon should be found");
    assert_eq!((found.width, found.height), (40, 40));
    assert_eq!(found.position(), (80, 80));
}

#[test]
fn enhanced_skips_scales_that_do_not_fit() {
    let icon = block_icon(11, 40, 40);
    let frame = frame(compose(44, 44, &[(&icon, 2, 2)]));
    let template = Template::from_rgb("icon", icon);
    let m = matcher();

    assert!(m.match_one_enhanced(&frame, &template, 0.9, &[1.5, 2.0]).is_none());
    let found = m
        .match_one_enhanced(&frame, &template, 0.9, &[1.5, 1.0])
        .expect("1.0 fits");
    assert_eq!(found.position(), (22, 22));
}

#[test]
fn fast_match_refines_to_full_resolution() {
    let icon = block_icon(12, 40, 40);
    let frame = frame(compose(800, 600, &[(&icon, 300, 220)]));
    let template = Template::from_rgb("icon", icon);

    let found = matcher()
        .match_one_fast(&frame, &template, 0.9, Some(0.5))
        .expect("icon should be found");
    assert_eq!(found.anchor, Anchor::TopLeft);
    assert_eq!(found.position(), (300, 220));
    assert!(found.confidence >= 0.999);
}

#[test]
fn fast_match_without_downsampling_is_direct() {
    let icon = block_icon(13, 40, 40);
    let frame = frame(compose(240, 160, &[(&icon, 120, 100)]));
    let template = Template::from_rgb("icon", icon);
    let m = matcher();

    let direct = m.match_one_fast(&frame, &template, 0.9, None).expect("found");
    assert_eq!(direct.position(), (120, 100));
    assert_eq!(m.match_one_fast(&frame, &template, 0.9, Some(1.0)), Some(direct));
    assert!(m.match_one_fast(&frame, &icon_template(14), 0.9, Some(0.5)).is_none());
}

#[test]
fn match_all_counts_distinct_instances() {
    let icon = block_icon(15, 40, 40);
    let positions = [(20, 20), (120, 20), (220, 20), (20, 120), (220, 140)];
    let placements: Vec<(&RgbImage, u32, u32)> =
        positions.iter().map(|&(x, y)| (&icon, x, y)).collect();
    let frame = frame(compose(320, 240, &placements));
    let template = Template::from_rgb("icon", icon.clone());
    let m = matcher();

    let first = m.match_all(&frame, &template, 0.9, ColorMode::Grayscale);
    assert_eq!(first.len(), positions.len());
    let mut centers: Vec<(u32, u32)> = first.iter().map(|r| r.position()).collect();
    centers.sort();
    let mut expected: Vec<(u32, u32)> = positions.iter().map(|&(x, y)| (x + 20, y + 20)).collect();
    expected.sort();
    assert_eq!(centers, expected);

    let second = m.match_all(&frame, &template, 0.9, ColorMode::Grayscale);
    assert_eq!(first, second);
    assert!(first.iter().all(|r| r.confidence >= 0.9 && r.anchor == Anchor::Center));
    assert!(first.windows(2).all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn match_all_suppresses_overlapping_candidates() {
    // A low threshold lets the one-pixel neighbours of each instance through.
    let icon = block_icon(16, 40, 40);
    let frame = frame(compose(200, 100, &[(&icon, 20, 30), (&icon, 120, 30)]));
    let template = Template::from_rgb("icon", icon);

    let found = matcher().match_all(&frame, &template, 0.6, ColorMode::Grayscale);
    assert_eq!(found.len(), 2);
    let radius = 0.8 * 40.0;
    let (a, b) = (&found[0], &found[1]);
    let dist = ((a.x as f32 - b.x as f32).powi(2) + (a.y as f32 - b.y as f32).powi(2)).sqrt();
    assert!(dist > radius);
}

#[test]
fn end_to_end_two_icons_on_800x600() {
    let icon = block_icon(17, 40, 40);
    let frame = frame(compose(800, 600, &[(&icon, 100, 200), (&icon, 500, 200)]));
    let template = Template::from_rgb("icon", icon);
    let m = matcher();

    let found = m.match_all(&frame, &template, 0.9, ColorMode::Grayscale);
    assert_eq!(found.len(), 2);
    let mut centers: Vec<(u32, u32)> = found.iter().map(|r| r.center()).collect();
    centers.sort();
    assert_eq!(centers, vec![(120, 220), (520, 220)]);
    assert!(found.iter().all(|r| r.confidence >= 0.99));

    let unrelated = icon_template(18);
    assert!(m.match_all(&frame, &unrelated, 0.9, ColorMode::Grayscale).is_empty());
}

#[test]
fn match_all_with_oversized_template_is_empty() {
    let frame = frame(compose(30, 30, &[]));
    assert!(
        matcher()
            .match_all(&frame, &icon_template(19), 0.0, ColorMode::Grayscale)
            .is_empty()
    );
}

/// Counts how often the cache actually decodes.
struct CountingDecoder {
    decodes: Arc<AtomicUsize>,
}

impl TemplateDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> TemplateResult<DynamicImage> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        FileDecoder.decode(path)
    }
}

fn counting_cache() -> (TemplateCache, Arc<AtomicUsize>) {
    let decodes = Arc::new(AtomicUsize::new(0));
    let cache = TemplateCache::with_decoder(Box::new(CountingDecoder {
        decodes: Arc::clone(&decodes),
    }));
    (cache, decodes)
}

fn write_icon(dir: &Path, name: &str, seed: u64) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_png(&block_icon(seed, 24, 16))).unwrap();
    path
}

#[test]
fn cache_returns_identical_contents_without_redecoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon(dir.path(), "button.png", 20);
    let (cache, decodes) = counting_cache();

    let first = cache.load(&path, ColorMode::Grayscale).unwrap();
    let second = cache.load(&path, ColorMode::Grayscale).unwrap();
    assert_eq!(decodes.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.as_gray().as_raw(), second.as_gray().as_raw());
    assert_eq!(first.name(), "button");
    assert_eq!(first.dimensions(), (24, 16));
    assert_eq!(first.color_mode(), ColorMode::Grayscale);

    let color = cache.load(&path, ColorMode::Color).unwrap();
    assert_eq!(decodes.load(Ordering::SeqCst), 2);
    assert_eq!(color.color_mode(), ColorMode::Color);
    assert_eq!(cache.info(), CacheInfo { color: 1, grayscale: 1 });
}

#[test]
fn cache_clear_forces_decode() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_icon(dir.path(), "button.png", 21);
    let (cache, decodes) = counting_cache();

    cache.load(&path, ColorMode::Grayscale).unwrap();
    cache.load(&path, ColorMode::Color).unwrap();
    cache.clear();
    assert_eq!(cache.info(), CacheInfo::default());

    cache.load(&path, ColorMode::Grayscale).unwrap();
    assert_eq!(decodes.load(Ordering::SeqCst), 3);
}

#[test]
fn cache_does_not_remember_failures() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.png");
    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    let (cache, decodes) = counting_cache();

    for _ in 0..2 {
        assert!(matches!(
            cache.load(&missing, ColorMode::Grayscale),
            Err(TemplateError::NotFound { .. })
        ));
        assert!(matches!(
            cache.load(&corrupt, ColorMode::Grayscale),
            Err(TemplateError::Decode { .. })
        ));
    }
    assert_eq!(decodes.load(Ordering::SeqCst), 4);
    assert_eq!(cache.info(), CacheInfo::default());

    // Once the file appears the next load succeeds
    std::fs::write(&missing, encode_png(&block_icon(22, 8, 8))).unwrap();
    assert!(cache.load(&missing, ColorMode::Grayscale).is_ok());
}

struct EmptyDecoder;

impl TemplateDecoder for EmptyDecoder {
    fn decode(&self, _path: &Path) -> TemplateResult<DynamicImage> {
        Ok(DynamicImage::new_rgb8(0, 0))
    }
}

#[test]
fn cache_rejects_empty_images() {
    let cache = TemplateCache::with_decoder(Box::new(EmptyDecoder));
    assert!(matches!(
        cache.load("anything.png", ColorMode::Color),
        Err(TemplateError::Empty { .. })
    ));
}

#[test]
fn cached_template_matches_frame() {
    let dir = tempfile::tempdir().unwrap();
    let icon = block_icon(23, 40, 40);
    let path = dir.path().join("icon.png");
    std::fs::write(&path, encode_png(&icon)).unwrap();
    let cache = TemplateCache::new();
    let template = cache.load(&path, ColorMode::Grayscale).unwrap();

    let frame = frame(compose(200, 200, &[(&icon, 60, 100)]));
    let found = matcher()
        .match_one(&frame, &template, 0.99, ColorMode::Grayscale, None, 1.0)
        .expect("found");
    assert_eq!(found.position(), (60, 100));
}
