use super::frame::Frame;
use super::source::FrameSource;
use crate::cooldown::ErrorCooldown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

type Slot = Arc<Mutex<Option<Frame>>>;

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Background poller that keeps the most recent frame in a single shared slot.
///
/// The slot lock is only held to swap or clone a `Frame` handle, never across I/O.
pub struct ContinuousCaptureBuffer<S> {
    source: Arc<S>,
    slot: Slot,
    interval: Duration,
    stop_timeout: Duration,
    error_cooldown: Duration,
    worker: Mutex<Option<Worker>>,
}

impl<S: FrameSource> ContinuousCaptureBuffer<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_timing(source, DEFAULT_CAPTURE_INTERVAL, DEFAULT_STOP_TIMEOUT)
    }

    pub fn with_timing(source: Arc<S>, interval: Duration, stop_timeout: Duration) -> Self {
        Self {
            source,
            slot: Arc::new(Mutex::new(None)),
            interval,
            stop_timeout,
            error_cooldown: crate::cooldown::DEFAULT_ERROR_COOLDOWN,
            worker: Mutex::new(None),
        }
    }

    pub fn with_error_cooldown(mut self, cooldown: Duration) -> Self {
        self.error_cooldown = cooldown;
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the worker unless one is already running. Returns true if a worker was spawned.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = worker.as_ref()
            && !existing.handle.is_finished()
        {
            log::debug!("📸 Continuous capture already running");
            return false;
        }

        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.source),
            Arc::clone(&self.slot),
            Arc::clone(&running),
            self.interval,
            self.error_cooldown,
        ));
        *worker = Some(Worker { running, handle });
        log::info!(
            "📸 Continuous capture started (every {}ms)",
            self.interval.as_millis()
        );
        true
    }

    /// Signal the worker and wait for it, at most `stop_timeout`.
    ///
    /// No slot write happens after this returns, even if the join timed out.
    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Worker {
            running,
            mut handle,
        }) = worker
        else {
            return;
        };

        running.store(false, Ordering::SeqCst);
        // A write in progress finishes before we pass; later writers see the cleared flag.
        drop(self.slot.lock().unwrap_or_else(PoisonError::into_inner));

        match tokio::time::timeout(self.stop_timeout, &mut handle).await {
            Ok(_) => log::info!("📸 Continuous capture stopped"),
            Err(_) => {
                log::warn!(
                    "📸 Capture worker did not exit within {}ms, aborting it",
                    self.stop_timeout.as_millis()
                );
                handle.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// The most recent frame, if any has been captured.
    pub fn latest(&self) -> Option<Frame> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the held frame so the next reader waits for a fresh capture.
    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<S> Drop for ContinuousCaptureBuffer<S> {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.running.store(false, Ordering::SeqCst);
            worker.handle.abort();
        }
    }
}

async fn run_worker<S: FrameSource>(
    source: Arc<S>,
    slot: Slot,
    running: Arc<AtomicBool>,
    interval: Duration,
    cooldown: Duration,
) {
    let mut errors = ErrorCooldown::new(cooldown);

    while running.load(Ordering::SeqCst) {
        // Captures run in their own task so a panicking source cannot kill the poller.
        let attempt = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.capture().await }).await
        };

        match attempt {
            Ok(Ok(frame)) => {
                let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                *current = Some(frame);
            }
            Ok(Err(e)) => {
                if errors.ready() {
                    let suppressed = errors.take_suppressed();
                    log::warn!("📸 Capture failed: {e} ({suppressed} similar suppressed)");
                } else {
                    log::debug!("📸 Capture failed: {e}");
                }
            }
            Err(e) => {
                if errors.ready() {
                    log::error!("📸 Capture task crashed: {e}");
                }
            }
        }

        tokio::time::sleep(interval).await;
    }
    log::debug!("📸 Capture worker exiting");
}
