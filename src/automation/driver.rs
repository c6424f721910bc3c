// Input injection with bounds validation, liveness probing and bounded retry
use super::config::ActionPolicy;
use crate::device::{DeviceControl, DeviceResult, KeyCode};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub const DEFAULT_GESTURE_MS: u32 = 300;

/// Wraps a device with the checks every input action goes through.
///
/// All operations report success as `bool`; failures are logged, never returned.
pub struct ActionDriver<D> {
    device: Arc<D>,
    policy: ActionPolicy,
    bounds: RwLock<Option<(u32, u32)>>,
}

impl<D: DeviceControl> ActionDriver<D> {
    pub fn new(device: Arc<D>, policy: ActionPolicy) -> Self {
        Self {
            device,
            policy,
            bounds: RwLock::new(None),
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Last known target size. `None` until queried.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        *self.bounds.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_bounds(&self, width: u32, height: u32) {
        *self.bounds.write().unwrap_or_else(PoisonError::into_inner) = Some((width, height));
    }

    /// Re-query the target size from the device.
    pub async fn refresh_bounds(&self) -> bool {
        match self.device.screen_size().await {
            Ok((width, height)) => {
                log::debug!("📐 {} screen is {width}x{height}", self.device.device_name());
                self.set_bounds(width, height);
                true
            }
            Err(e) => {
                log::warn!("⚠️ Could not read screen size: {e}");
                false
            }
        }
    }

    fn validate(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        let (ux, uy) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        match self.bounds() {
            Some((width, height)) if ux >= width || uy >= height => None,
            _ => Some((ux, uy)),
        }
    }

    fn validate_all<const N: usize>(&self, what: &str, points: [(i32, i32); N]) -> Option<[(u32, u32); N]> {
        let mut valid = [(0, 0); N];
        for (slot, (x, y)) in valid.iter_mut().zip(points) {
            match self.validate(x, y) {
                Some(p) => *slot = p,
                None => {
                    log::warn!(
                        "⚠️ {what}: ({x}, {y}) is outside the target bounds {:?}",
                        self.bounds()
                    );
                    return None;
                }
            }
        }
        Some(valid)
    }

    /// Make sure the link is believed good, probing once if it is not.
    async fn ensure_alive(&self) -> bool {
        let connection = self.device.connection();
        if connection.is_alive() {
            return true;
        }
        if self.device.check_connection().await {
            connection.mark_alive();
            return true;
        }
        false
    }

    /// For desktop targets every point must resolve to the expected window.
    fn lands_on_target(&self, points: &[(u32, u32)]) -> bool {
        let Some(target) = self.device.target_window() else {
            return true;
        };
        let (ox, oy) = self.device.origin();
        points.iter().all(|&(x, y)| {
            let ax = i32::try_from(x).ok().and_then(|x| ox.checked_add(x));
            let ay = i32::try_from(y).ok().and_then(|y| oy.checked_add(y));
            match (ax, ay) {
                (Some(ax), Some(ay)) => self.device.window_at(ax, ay) == Some(target),
                _ => false,
            }
        })
    }

    async fn perform<F, Fut>(&self, what: &str, points: &[(u32, u32)], op: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: Future<Output = DeviceResult<()>>,
    {
        let attempts = self.policy.retries.max(1);
        for attempt in 1..=attempts {
            if !self.ensure_alive().await {
                log::warn!("⚠️ {what}: device {} is not connected", self.device.device_name());
                return false;
            }

            if !self.lands_on_target(points) {
                log::warn!("⚠️ {what}: point is not over the target window (attempt {attempt}/{attempts})");
            } else {
                match op().await {
                    Ok(()) => return true,
                    Err(e) if e.is_disconnect() => {
                        self.device.connection().mark_lost();
                        log::warn!("🔌 {what}: device lost ({e})");
                        return false;
                    }
                    Err(e) => log::warn!("⚠️ {what} failed (attempt {attempt}/{attempts}): {e}"),
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff()).await;
            }
        }
        log::error!("❌ {what}: giving up after {attempts} attempt(s)");
        false
    }

    /// Tap `repeat` times at one point, then wait `hold`.
    pub async fn tap(&self, x: i32, y: i32, hold: Duration, repeat: u32) -> bool {
        let Some([(px, py)]) = self.validate_all("tap", [(x, y)]) else {
            return false;
        };
        for _ in 0..repeat.max(1) {
            if !self
                .perform("tap", &[(px, py)], || self.device.tap(px, py))
                .await
            {
                return false;
            }
        }
        log::debug!("👆 Tapped ({px}, {py}) x{}", repeat.max(1));
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
        true
    }

    pub async fn tap_once(&self, x: i32, y: i32) -> bool {
        self.tap(x, y, Duration::ZERO, 1).await
    }

    pub async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> bool {
        let Some(points) = self.validate_all("swipe", [(x1, y1), (x2, y2)]) else {
            return false;
        };
        let [(ax, ay), (bx, by)] = points;
        self.perform("swipe", &points, || self.device.swipe(ax, ay, bx, by, duration_ms))
            .await
    }

    /// Slower, held gesture between two points.
    pub async fn drag(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> bool {
        let Some(points) = self.validate_all("drag", [(x1, y1), (x2, y2)]) else {
            return false;
        };
        let [(ax, ay), (bx, by)] = points;
        self.perform("drag", &points, || self.device.drag(ax, ay, bx, by, duration_ms))
            .await
    }

    pub async fn send_text(&self, text: &str) -> bool {
        self.perform("send text", &[], || self.device.send_text(text))
            .await
    }

    pub async fn press_key(&self, key: KeyCode) -> bool {
        self.perform("key press", &[], || self.device.press_key(key))
            .await
    }

    pub async fn go_back(&self) -> bool {
        self.press_key(KeyCode::BACK).await
    }

    pub async fn go_home(&self) -> bool {
        self.press_key(KeyCode::HOME).await
    }
}
