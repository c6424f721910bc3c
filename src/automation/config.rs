// Timing and retry policy for one automation instance
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub backoff_ms: u64,
    /// Bound on one reopen-and-probe attempt
    pub attempt_timeout_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            backoff_ms: 1000,
            attempt_timeout_ms: 15000,
        }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionPolicy {
    /// Total attempts per action, at least one
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_ms: 500,
        }
    }
}

impl ActionPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// All durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub capture_interval_ms: u64,
    pub capture_stop_timeout_ms: u64,
    /// Pause after every perception cycle
    pub cycle_quantum_ms: u64,
    /// Pause when no frame has been captured yet
    pub frame_wait_ms: u64,
    /// Minimum spacing between repeated error lines
    pub error_cooldown_ms: u64,
    /// Extra pause after a failed cycle
    pub error_backoff_ms: u64,
    /// How often the running loop re-probes the device
    pub liveness_interval_ms: u64,
    pub reconnect: ReconnectPolicy,
    pub action: ActionPolicy,
    /// Poll frames in the background; otherwise capture on demand each cycle
    pub continuous_capture: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: 500,
            capture_stop_timeout_ms: 2000,
            cycle_quantum_ms: 100,
            frame_wait_ms: 100,
            error_cooldown_ms: 5000,
            error_backoff_ms: 500,
            liveness_interval_ms: 3000,
            reconnect: ReconnectPolicy::default(),
            action: ActionPolicy::default(),
            continuous_capture: true,
        }
    }
}

impl AutomationConfig {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn capture_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_stop_timeout_ms)
    }

    pub fn cycle_quantum(&self) -> Duration {
        Duration::from_millis(self.cycle_quantum_ms)
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }
}
