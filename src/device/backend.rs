use super::error::DeviceResult;
use super::rust_impl::RustAdb;
use super::shell::AdbShell;
use super::types::{BackendKind, DeviceConfig, DeviceConnection, DeviceControl, KeyCode};

pub enum DeviceBackend {
    Shell(AdbShell),
    Rust(RustAdb),
}

impl DeviceBackend {
    pub async fn connect(config: &DeviceConfig) -> DeviceResult<Self> {
        match config.backend {
            BackendKind::Rust => Ok(DeviceBackend::Rust(RustAdb::connect(config).await?)),
            BackendKind::Shell => Ok(DeviceBackend::Shell(AdbShell::connect(config).await?)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            DeviceBackend::Shell(_) => BackendKind::Shell,
            DeviceBackend::Rust(_) => BackendKind::Rust,
        }
    }
}

impl DeviceControl for DeviceBackend {
    fn connection(&self) -> &DeviceConnection {
        match self {
            DeviceBackend::Shell(s) => s.connection(),
            DeviceBackend::Rust(r) => r.connection(),
        }
    }

    async fn screen_size(&self) -> DeviceResult<(u32, u32)> {
        match self {
            DeviceBackend::Shell(s) => s.screen_size().await,
            DeviceBackend::Rust(r) => r.screen_size().await,
        }
    }

    async fn capture_bytes(&self) -> DeviceResult<Vec<u8>> {
        match self {
            DeviceBackend::Shell(s) => s.capture_bytes().await,
            DeviceBackend::Rust(r) => r.capture_bytes().await,
        }
    }

    async fn tap(&self, x: u32, y: u32) -> DeviceResult<()> {
        match self {
            DeviceBackend::Shell(s) => s.tap(x, y).await,
            DeviceBackend::Rust(r) => r.tap(x, y).await,
        }
    }

    async fn swipe(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        match self {
            DeviceBackend::Shell(s) => s.swipe(x1, y1, x2, y2, duration_ms).await,
            DeviceBackend::Rust(r) => r.swipe(x1, y1, x2, y2, duration_ms).await,
        }
    }

    async fn drag(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        match self {
            DeviceBackend::Shell(s) => s.drag(x1, y1, x2, y2, duration_ms).await,
            DeviceBackend::Rust(r) => r.drag(x1, y1, x2, y2, duration_ms).await,
        }
    }

    async fn send_text(&self, text: &str) -> DeviceResult<()> {
        match self {
            DeviceBackend::Shell(s) => s.send_text(text).await,
            DeviceBackend::Rust(r) => r.send_text(text).await,
        }
    }

    async fn press_key(&self, key: KeyCode) -> DeviceResult<()> {
        match self {
            DeviceBackend::Shell(s) => s.press_key(key).await,
            DeviceBackend::Rust(r) => r.press_key(key).await,
        }
    }

    async fn check_connection(&self) -> bool {
        match self {
            DeviceBackend::Shell(s) => s.check_connection().await,
            DeviceBackend::Rust(r) => r.check_connection().await,
        }
    }

    async fn reconnect(&self) -> DeviceResult<()> {
        match self {
            DeviceBackend::Shell(s) => s.reconnect().await,
            DeviceBackend::Rust(r) => r.reconnect().await,
        }
    }
}
