// Device control over ADB: one capability trait, two transports
// (adb_client speaking the server protocol, or the `adb` executable).

pub mod backend;
pub mod error;
pub mod rust_impl;
pub mod shell;
pub mod types;

pub use backend::DeviceBackend;
pub use error::{DeviceError, DeviceResult};
pub use rust_impl::RustAdb;
pub use shell::AdbShell;
pub use types::{
    BackendKind, DeviceConfig, DeviceConnection, DeviceControl, KeyCode, WindowHandle,
};
