pub mod args;
pub mod automation;
pub mod capture;
pub mod cooldown;
pub mod device;
pub mod template_matching;

#[cfg(test)]
mod testing;

pub use automation::{AutomationLoop, AutomationSession, LoopState, RoutineRegistry, StopHandle};
pub use capture::{ContinuousCaptureBuffer, Frame, FrameSource};
pub use device::{DeviceBackend, DeviceConfig, DeviceControl};
pub use template_matching::{MatchConfig, MatchResult, Matcher, TemplateCache};
