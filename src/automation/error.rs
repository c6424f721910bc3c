use crate::capture::CaptureError;
use crate::device::DeviceError;
use crate::template_matching::TemplateError;
use thiserror::Error;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Could not acquire device: {source}")]
    ConnectFailed {
        #[source]
        source: DeviceError,
    },

    #[error("Device did not answer the liveness probe")]
    NotResponding,

    #[error("Reconnection gave up after {attempts} attempt(s)")]
    ReconnectExhausted { attempts: u32 },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Routine '{routine}' failed: {description}")]
    Routine { routine: String, description: String },

    #[error("Unknown routine '{0}'")]
    UnknownRoutine(String),

    #[error("Routine '{0}' is already registered")]
    DuplicateRoutine(String),

    #[error("Invalid routine name '{0}'")]
    InvalidRoutineName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
