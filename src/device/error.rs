use thiserror::Error;

/// A specialized `Result` type for device-control operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// The error type for all device-control operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to open device '{serial}' on {endpoint}: {source}")]
    ConnectionFailed {
        serial: String,
        endpoint: String,
        source: adb_client::RustADBError,
    },

    #[error("Shell command '{command}' failed: {source}")]
    ShellCommandFailed {
        command: String,
        source: adb_client::RustADBError,
    },

    #[error("adb {command} exited with {status}: {stderr}")]
    AdbBinaryFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to run adb binary: {source}")]
    AdbBinaryUnavailable {
        #[from]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: std::time::Duration,
        description: String,
    },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Could not parse screen size from 'wm size' output: {output}")]
    ScreenSizeParseFailed { output: String },

    #[error("Device '{serial}' is disconnected: {description}")]
    Disconnected { serial: String, description: String },

    #[error("Device '{serial}' is not connected")]
    NotConnected { serial: String },

    #[error("ADB protocol desync - connection needs to be re-established: {description}")]
    ProtocolDesync { description: String },
}

impl DeviceError {
    /// True when the failure means the link to the device is gone and must be re-probed.
    pub fn is_disconnect(&self) -> bool {
        match self {
            DeviceError::Disconnected { .. }
            | DeviceError::NotConnected { .. }
            | DeviceError::ProtocolDesync { .. }
            | DeviceError::Timeout { .. }
            | DeviceError::ConnectionFailed { .. } => true,
            DeviceError::ShellCommandFailed { source, .. } => {
                is_disconnect_message(&source.to_string())
            }
            DeviceError::AdbBinaryFailed { stderr, .. } => is_disconnect_message(stderr),
            _ => false,
        }
    }

    /// Wrap an `adb_client` shell failure, promoting protocol errors to `ProtocolDesync`.
    pub fn from_shell_error(command: &[&str], source: adb_client::RustADBError) -> Self {
        let command = command.join(" ");
        let err_str = source.to_string();
        if err_str.contains("CLSE") || err_str.contains("no write endpoint") {
            DeviceError::ProtocolDesync {
                description: format!("'{command}' failed with protocol error: {err_str}"),
            }
        } else {
            DeviceError::ShellCommandFailed { command, source }
        }
    }
}

/// Heuristic match on transport error text that indicates a lost device.
pub fn is_disconnect_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "device offline",
        "not found",
        "no devices",
        "device unauthorized",
        "connection refused",
        "connection reset",
        "broken pipe",
        "closed",
        "clse",
        "no write endpoint",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}
