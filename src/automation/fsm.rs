// Perception-action loop: Disconnected -> Connecting -> Running -> (Disconnected | Stopped)
use super::error::{AutomationError, AutomationResult};
use super::routine::{CycleFuture, Routine};
use super::session::AutomationSession;
use super::types::{LoopState, StopHandle};
use crate::capture::Frame;
use crate::cooldown::ErrorCooldown;
use crate::device::{DeviceControl, DeviceError, DeviceResult};
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio::time::{Instant, sleep, timeout};

/// Polls a cycle future, turning a panic inside it into `Err` with the panic message.
struct CatchPanic<'a>(CycleFuture<'a>);

impl Future for CatchPanic<'_> {
    type Output = Result<AutomationResult<()>, String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.0;
        match catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx))) {
            Ok(Poll::Ready(result)) => Poll::Ready(Ok(result)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct AutomationLoop<D: DeviceControl> {
    session: AutomationSession<D>,
    state: watch::Sender<LoopState>,
}

impl<D: DeviceControl> AutomationLoop<D> {
    pub fn new(session: AutomationSession<D>) -> Self {
        let (state, _) = watch::channel(LoopState::Disconnected);
        Self { session, state }
    }

    pub fn session(&self) -> &AutomationSession<D> {
        &self.session
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.session.stop_handle()
    }

    /// Whether the device link is currently believed good.
    pub fn is_connected(&self) -> bool {
        self.session.device().connection().is_alive()
    }

    fn change_state(&self, new_state: LoopState) {
        self.state.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            log::info!("🎮 Automation state: {state} -> {new_state}");
            *state = new_state;
            true
        });
    }

    /// Reopen the device link, giving up on an attempt that outlives the policy's bound.
    async fn reopen(&self, attempt: u32) -> DeviceResult<()> {
        let limit = self.session.config().reconnect.attempt_timeout();
        timeout(limit, self.session.device().reconnect())
            .await
            .unwrap_or_else(|_| {
                Err(DeviceError::Timeout {
                    duration: limit,
                    description: format!("reconnect attempt {attempt}"),
                })
            })
    }

    /// Probe the device and record the answer on the connection.
    async fn probe(&self) -> bool {
        let device = self.session.device();
        let limit = self.session.config().reconnect.attempt_timeout();
        let answered = timeout(limit, device.check_connection())
            .await
            .unwrap_or(false);
        if answered {
            device.connection().mark_alive();
            true
        } else {
            if device.connection().mark_lost() {
                log::warn!("🔌 {} stopped responding", device.device_name());
            }
            false
        }
    }

    async fn acquire(&self) -> AutomationResult<()> {
        if self.probe().await {
            return Ok(());
        }
        self.reopen(1)
            .await
            .map_err(|source| AutomationError::ConnectFailed { source })?;
        if self.probe().await {
            Ok(())
        } else {
            Err(AutomationError::NotResponding)
        }
    }

    /// Connecting sub-state. Returns once the device answers again or a stop is requested.
    async fn reconnect(&self, warnings: &mut ErrorCooldown) -> AutomationResult<()> {
        self.change_state(LoopState::Connecting);
        self.session.stop_capture().await;
        self.session.capture().clear();

        let device = self.session.device();
        let policy = &self.session.config().reconnect;
        let stop = self.session.stop_handle();
        let mut attempt: u32 = 0;

        loop {
            if stop.is_stopped() {
                return Ok(());
            }
            attempt += 1;
            if !policy.allows(attempt) {
                log::error!(
                    "❌ Giving up on {} after {} reconnect attempt(s)",
                    device.device_name(),
                    attempt - 1
                );
                return Err(AutomationError::ReconnectExhausted {
                    attempts: attempt - 1,
                });
            }

            match self.reopen(attempt).await {
                Ok(()) if self.probe().await => {
                    log::info!(
                        "✅ Reconnected to {} (attempt {attempt})",
                        device.device_name()
                    );
                    self.session.driver().refresh_bounds().await;
                    self.session.start_capture();
                    self.change_state(LoopState::Running);
                    return Ok(());
                }
                Ok(()) => {
                    if warnings.ready() {
                        log::warn!("🔌 {} reopened but not responding", device.device_name());
                    }
                }
                Err(e) => {
                    if warnings.ready() {
                        log::warn!("🔌 Reconnect attempt {attempt} failed: {e}");
                    }
                }
            }
            sleep(policy.backoff()).await;
        }
    }

    /// One routine cycle with panics reported as routine failures.
    async fn run_cycle_guarded(
        &self,
        routine: &mut dyn Routine<D>,
        frame: &Frame,
    ) -> AutomationResult<()> {
        let name = routine.name().to_string();
        let session = &self.session;
        let started = catch_unwind(AssertUnwindSafe(move || {
            let routine = routine;
            routine.run_cycle(session, frame)
        }));
        let outcome = match started {
            Ok(cycle) => CatchPanic(cycle).await,
            Err(payload) => Err(panic_message(payload.as_ref())),
        };
        outcome.unwrap_or_else(|message| {
            Err(AutomationError::Routine {
                routine: name,
                description: format!("panicked: {message}"),
            })
        })
    }

    /// Run `routine` until stopped.
    ///
    /// Returns `Err` only when the device cannot be acquired at entry or reconnection is
    /// exhausted. Routine failures and panics are logged (rate limited) and the loop carries on.
    pub async fn run(&self, routine: &mut dyn Routine<D>) -> AutomationResult<()> {
        let config = self.session.config();
        let stop = self.session.stop_handle();

        self.change_state(LoopState::Connecting);
        if let Err(e) = self.acquire().await {
            log::error!("❌ {e}");
            self.change_state(LoopState::Disconnected);
            return Err(e);
        }
        if !self.session.driver().refresh_bounds().await {
            log::warn!("⚠️ Screen bounds unknown; only negative coordinates will be rejected");
        }
        self.session.start_capture();
        self.change_state(LoopState::Running);
        log::info!(
            "🎮 Running '{}' on {}",
            routine.name(),
            self.session.device().device_name()
        );

        let mut cycle_errors = ErrorCooldown::new(config.error_cooldown());
        let mut link_warnings = ErrorCooldown::new(config.error_cooldown());
        let mut last_probe = Instant::now();

        let outcome = loop {
            if stop.is_stopped() {
                break Ok(());
            }

            let probe_due = last_probe.elapsed() >= config.liveness_interval();
            if !self.is_connected() || probe_due {
                last_probe = Instant::now();
                if !self.probe().await {
                    if let Err(e) = self.reconnect(&mut link_warnings).await {
                        break Err(e);
                    }
                    continue;
                }
            }

            let Some(frame) = self.session.capture_screen().await else {
                sleep(config.frame_wait()).await;
                continue;
            };

            if let Err(e) = self.run_cycle_guarded(&mut *routine, &frame).await {
                if cycle_errors.ready() {
                    let suppressed = cycle_errors.take_suppressed();
                    log::error!("❌ Cycle failed: {e} ({suppressed} similar suppressed)");
                } else {
                    log::debug!("Cycle failed: {e}");
                }
                sleep(config.error_backoff()).await;
            }
            sleep(config.cycle_quantum()).await;
        };

        self.session.stop_capture().await;
        match &outcome {
            Ok(()) => self.change_state(LoopState::Stopped),
            Err(_) => self.change_state(LoopState::Disconnected),
        }
        outcome
    }
}
