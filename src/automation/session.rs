// Capture + match + act helpers that game routines are written against
use super::config::AutomationConfig;
use super::driver::{ActionDriver, DEFAULT_GESTURE_MS};
use super::types::StopHandle;
use crate::capture::{ContinuousCaptureBuffer, DeviceFrameSource, Frame, FrameSource};
use crate::device::DeviceControl;
use crate::template_matching::{
    CacheInfo, ColorMode, MatchConfig, MatchResult, MatchSet, Matcher, SearchRegion, Template,
    TemplateCache,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const SWIPE_DISTANCE: i32 = 200;
const WAIT_PROGRESS_EVERY: Duration = Duration::from_secs(5);

/// Everything one automation instance owns: device, frame buffer, templates, matcher, input.
pub struct AutomationSession<D: DeviceControl> {
    device: Arc<D>,
    capture: ContinuousCaptureBuffer<DeviceFrameSource<D>>,
    templates: Arc<TemplateCache>,
    templates_dir: PathBuf,
    matcher: Matcher,
    driver: ActionDriver<D>,
    stop: StopHandle,
    config: AutomationConfig,
}

impl<D: DeviceControl> AutomationSession<D> {
    pub fn new(device: Arc<D>, config: AutomationConfig, match_config: MatchConfig) -> Self {
        let source = Arc::new(DeviceFrameSource::new(Arc::clone(&device)));
        let capture = ContinuousCaptureBuffer::with_timing(
            source,
            config.capture_interval(),
            config.capture_stop_timeout(),
        )
        .with_error_cooldown(config.error_cooldown());
        Self {
            driver: ActionDriver::new(Arc::clone(&device), config.action.clone()),
            device,
            capture,
            templates: Arc::new(TemplateCache::new()),
            templates_dir: PathBuf::from("."),
            matcher: Matcher::new(match_config),
            stop: StopHandle::new(),
            config,
        }
    }

    /// Resolve relative template names against `dir`.
    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    /// Share a template cache between sessions.
    pub fn with_template_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.templates = cache;
        self
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn driver(&self) -> &ActionDriver<D> {
        &self.driver
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn capture(&self) -> &ContinuousCaptureBuffer<DeviceFrameSource<D>> {
        &self.capture
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn start_capture(&self) {
        if self.config.continuous_capture {
            self.capture.start();
        }
    }

    pub async fn stop_capture(&self) {
        self.capture.stop().await;
    }

    /// Current frame: the buffered one with continuous capture, otherwise a direct capture.
    pub async fn capture_screen(&self) -> Option<Frame> {
        if self.config.continuous_capture {
            return self.capture.latest();
        }
        match self.capture.source().capture().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::debug!("📸 Direct capture failed: {e}");
                None
            }
        }
    }

    pub fn template_path(&self, name: &str) -> PathBuf {
        self.templates_dir.join(name)
    }

    /// Load through the cache; failures are logged and read as "no template".
    pub fn template(&self, name: &str, mode: ColorMode) -> Option<Arc<Template>> {
        match self.templates.load(self.template_path(name), mode) {
            Ok(template) => Some(template),
            Err(e) => {
                log::error!("❌ {e}");
                None
            }
        }
    }

    /// Best match in `frame`, top-left anchored.
    pub fn find_template_in(
        &self,
        frame: &Frame,
        name: &str,
        threshold: f32,
        roi: Option<&SearchRegion>,
    ) -> Option<MatchResult> {
        let mode = self.matcher.config().color_mode;
        let template = self.template(name, mode)?;
        self.matcher
            .match_one(frame, &template, threshold, mode, roi, 1.0)
    }

    /// Best match in the current frame, top-left anchored.
    pub async fn find_template(&self, name: &str, threshold: f32) -> Option<MatchResult> {
        let frame = self.capture_screen().await?;
        self.find_template_in(&frame, name, threshold, None)
    }

    /// Multi-scale search using the configured scales; centre anchored.
    pub async fn find_template_enhanced(&self, name: &str, threshold: f32) -> Option<MatchResult> {
        let frame = self.capture_screen().await?;
        let template = self.template(name, ColorMode::Grayscale)?;
        let scales = &self.matcher.config().enhanced_scales;
        self.matcher
            .match_one_enhanced(&frame, &template, threshold, scales)
    }

    /// Coarse-to-fine search using the configured downsample factor; top-left anchored.
    pub async fn find_template_fast(&self, name: &str, threshold: f32) -> Option<MatchResult> {
        let frame = self.capture_screen().await?;
        let template = self.template(name, ColorMode::Grayscale)?;
        let factor = self.matcher.config().downsample_factor;
        self.matcher
            .match_one_fast(&frame, &template, threshold, Some(factor))
    }

    /// Tap the centre of the best match `tap_count` times.
    pub async fn find_and_tap(&self, name: &str, threshold: f32, tap_count: u32) -> bool {
        let started = Instant::now();
        let Some(found) = self.find_template(name, threshold).await else {
            return false;
        };
        let (x, y) = found.center();
        if !self
            .driver
            .tap(x as i32, y as i32, Duration::ZERO, tap_count)
            .await
        {
            return false;
        }
        log::info!(
            "✅ [FIND TAP] ({x}, {y}) {name} - confidence {:.2}, {:.2}s",
            found.confidence,
            started.elapsed().as_secs_f32()
        );
        true
    }

    /// Tap fixed coordinates, gated on `name` being visible. `None` taps unconditionally.
    pub async fn find_and_tap_position(
        &self,
        name: Option<&str>,
        x: i32,
        y: i32,
        threshold: f32,
    ) -> bool {
        if let Some(name) = name {
            let Some(found) = self.find_template(name, threshold).await else {
                return false;
            };
            log::debug!("{name} visible at {found}");
        }
        let tapped = self.driver.tap_once(x, y).await;
        if tapped {
            log::info!("✅ [FIND TAP POSITION] ({x}, {y}) {}", name.unwrap_or("direct"));
        }
        tapped
    }

    /// Tap at the match's top-left corner shifted by `offset`.
    pub async fn find_and_tap_with_offset(
        &self,
        name: &str,
        offset: (i32, i32),
        threshold: f32,
    ) -> bool {
        let Some(found) = self.find_template(name, threshold).await else {
            return false;
        };
        self.driver
            .tap_once(found.x as i32 + offset.0, found.y as i32 + offset.1)
            .await
    }

    /// Poll until `name` appears, the timeout passes, or the session is stopped.
    pub async fn wait_for_template(
        &self,
        name: &str,
        timeout: Duration,
        interval: Duration,
        threshold: f32,
    ) -> Option<MatchResult> {
        self.wait_for_any_template(&[name], timeout, interval, threshold)
            .await
            .map(|(_, found)| found)
    }

    /// Poll until any of `names` appears. Returns the first one found in list order.
    pub async fn wait_for_any_template(
        &self,
        names: &[&str],
        timeout: Duration,
        interval: Duration,
        threshold: f32,
    ) -> Option<(String, MatchResult)> {
        let mode = self.matcher.config().color_mode;
        let templates: Vec<(&str, Arc<Template>)> = names
            .iter()
            .filter_map(|name| self.template(name, mode).map(|t| (*name, t)))
            .collect();
        if templates.is_empty() {
            log::error!("❌ No valid templates to wait for");
            return None;
        }

        log::info!(
            "⏳ Waiting for {} (timeout {:.1}s, threshold {threshold:.2})",
            names.join(", "),
            timeout.as_secs_f32()
        );
        let started = Instant::now();
        let mut last_progress = started;
        let mut attempts = 0u32;

        while started.elapsed() < timeout && !self.stop.is_stopped() {
            attempts += 1;
            if let Some(frame) = self.capture_screen().await {
                for (name, template) in &templates {
                    if let Some(found) =
                        self.matcher
                            .match_one(&frame, template, threshold, mode, None, 1.0)
                    {
                        log::info!(
                            "✅ {name} found after {:.2}s ({attempts} attempts) at {found}",
                            started.elapsed().as_secs_f32()
                        );
                        return Some((name.to_string(), found));
                    }
                }
            }
            if last_progress.elapsed() >= WAIT_PROGRESS_EVERY {
                last_progress = Instant::now();
                log::info!(
                    "⏳ Still waiting for {} ({:.0}s elapsed)",
                    names.join(", "),
                    started.elapsed().as_secs_f32()
                );
            }
            tokio::time::sleep(interval).await;
        }

        log::warn!(
            "⚠️ Timed out after {:.1}s waiting for {} ({attempts} attempts)",
            timeout.as_secs_f32(),
            names.join(", ")
        );
        None
    }

    pub async fn wait_and_tap(
        &self,
        name: &str,
        timeout: Duration,
        interval: Duration,
        threshold: f32,
    ) -> bool {
        let Some(found) = self
            .wait_for_template(name, timeout, interval, threshold)
            .await
        else {
            return false;
        };
        let (x, y) = found.center();
        self.driver.tap_once(x as i32, y as i32).await
    }

    /// Every non-duplicate instance of `name` in the current frame, centre anchored.
    pub async fn find_all_templates(&self, name: &str, threshold: f32) -> MatchSet {
        let mode = self.matcher.config().color_mode;
        let (Some(frame), Some(template)) =
            (self.capture_screen().await, self.template(name, mode))
        else {
            return MatchSet::default();
        };
        self.matcher.match_all(&frame, &template, threshold, mode)
    }

    /// Best match for each name in one frame; names that are not visible are omitted.
    pub async fn batch_find_templates(
        &self,
        names: &[&str],
        threshold: f32,
    ) -> BTreeMap<String, MatchResult> {
        let Some(frame) = self.capture_screen().await else {
            return BTreeMap::new();
        };
        names
            .iter()
            .filter_map(|name| {
                self.find_template_in(&frame, name, threshold, None)
                    .map(|found| (name.to_string(), found))
            })
            .collect()
    }

    pub async fn swipe_up(&self, x: i32, y: i32) -> bool {
        self.driver
            .swipe(x, y, x, y - SWIPE_DISTANCE, DEFAULT_GESTURE_MS)
            .await
    }

    pub async fn swipe_down(&self, x: i32, y: i32) -> bool {
        self.driver
            .swipe(x, y, x, y + SWIPE_DISTANCE, DEFAULT_GESTURE_MS)
            .await
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.templates.info()
    }

    pub fn clear_template_cache(&self) {
        self.templates.clear();
    }
}
