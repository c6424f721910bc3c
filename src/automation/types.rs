// Types shared by the automation loop and its callers
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Connecting,
    Running,
    Stopped,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoopState::Disconnected => "disconnected",
            LoopState::Connecting => "connecting",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Cooperative stop flag. Clones share the flag; the loop checks it once per cycle.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous stop request so the loop can be run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
