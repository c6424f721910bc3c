// Rate limiting for repeated warning/error lines
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(5);

/// Minimum spacing between repeated log lines for a persistent fault.
#[derive(Debug, Clone)]
pub struct ErrorCooldown {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u32,
}

impl ErrorCooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// True when a line may be emitted now. Calls inside the window are counted as suppressed.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => {
                self.suppressed += 1;
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Number of lines swallowed since the last call.
    pub fn take_suppressed(&mut self) -> u32 {
        std::mem::take(&mut self.suppressed)
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.suppressed = 0;
    }
}

impl Default for ErrorCooldown {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn suppresses_inside_window() {
        let mut cooldown = ErrorCooldown::new(Duration::from_secs(5));
        assert!(cooldown.ready());
        assert!(!cooldown.ready());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!cooldown.ready());
        assert_eq!(cooldown.take_suppressed(), 2);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cooldown.ready());
        assert_eq!(cooldown.take_suppressed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_allows_next_line() {
        let mut cooldown = ErrorCooldown::default();
        assert!(cooldown.ready());
        cooldown.reset();
        assert!(cooldown.ready());
    }
}
