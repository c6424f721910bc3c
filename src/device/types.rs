// Core device-control types and the capability trait the automation core consumes
use super::error::DeviceResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Android key event codes used with `input keyevent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const HOME: KeyCode = KeyCode(3);
    pub const BACK: KeyCode = KeyCode(4);
    pub const VOLUME_UP: KeyCode = KeyCode(24);
    pub const VOLUME_DOWN: KeyCode = KeyCode(25);
    pub const POWER: KeyCode = KeyCode(26);
    pub const ENTER: KeyCode = KeyCode(66);
    pub const MENU: KeyCode = KeyCode(82);
}

/// Opaque OS window identifier for desktop targets.
pub type WindowHandle = u64;

/// Identity, endpoint and liveness of one controlled device.
///
/// The liveness flag is shared: clones observe and update the same flag, so the
/// capture worker, the action driver and the loop agree on whether the link is good.
#[derive(Debug, Clone)]
pub struct DeviceConnection {
    serial: String,
    endpoint: SocketAddrV4,
    alive: Arc<AtomicBool>,
}

impl DeviceConnection {
    pub fn new(serial: impl Into<String>, endpoint: SocketAddrV4) -> Self {
        Self {
            serial: serial.into(),
            endpoint,
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn endpoint(&self) -> SocketAddrV4 {
        self.endpoint
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Returns true if the link was previously considered alive.
    pub fn mark_lost(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }
}

/// Device-control capability: capture, input injection, geometry and liveness.
///
/// Methods return `Send` futures so generic callers can drive them from spawned tasks.
pub trait DeviceControl: Send + Sync + 'static {
    fn connection(&self) -> &DeviceConnection;

    fn device_name(&self) -> &str {
        self.connection().serial()
    }

    fn screen_size(&self) -> impl Future<Output = DeviceResult<(u32, u32)>> + Send;

    /// Raw encoded screenshot (PNG for the ADB backends).
    fn capture_bytes(&self) -> impl Future<Output = DeviceResult<Vec<u8>>> + Send;

    fn tap(&self, x: u32, y: u32) -> impl Future<Output = DeviceResult<()>> + Send;

    fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration_ms: u32,
    ) -> impl Future<Output = DeviceResult<()>> + Send;

    fn drag(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration_ms: u32,
    ) -> impl Future<Output = DeviceResult<()>> + Send;

    fn send_text(&self, text: &str) -> impl Future<Output = DeviceResult<()>> + Send;

    fn press_key(&self, key: KeyCode) -> impl Future<Output = DeviceResult<()>> + Send;

    /// Liveness probe. Any `true` is taken as "responsive".
    fn check_connection(&self) -> impl Future<Output = bool> + Send;

    /// Re-open the underlying handle after a lost link.
    fn reconnect(&self) -> impl Future<Output = DeviceResult<()>> + Send;

    /// Window expected under the cursor for desktop targets. Devices return `None`.
    fn target_window(&self) -> Option<WindowHandle> {
        None
    }

    /// OS point-to-window query in absolute coordinates.
    fn window_at(&self, _x: i32, _y: i32) -> Option<WindowHandle> {
        None
    }

    /// Top-left of the target in absolute coordinates.
    fn origin(&self) -> (i32, i32) {
        (0, 0)
    }
}

/// Which transport a backend uses to reach the ADB daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// adb_client speaking the ADB server protocol directly
    Rust,
    /// the `adb` executable
    Shell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device serial; `None` picks the server's single device.
    pub serial: Option<String>,
    pub host: Ipv4Addr,
    pub port: u16,
    pub backend: BackendKind,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            host: Ipv4Addr::LOCALHOST,
            port: 5037,
            backend: BackendKind::Rust,
        }
    }
}

impl DeviceConfig {
    pub fn endpoint(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }
}

/// Parse `wm size` output, preferring an override size over the physical one.
pub fn parse_wm_size(stdout: &str) -> Option<(u32, u32)> {
    let mut physical = None;
    for line in stdout.lines() {
        let line = line.trim();
        let (is_override, size_str) = if let Some(rest) = line.strip_prefix("Override size: ") {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix("Physical size: ") {
            (false, rest)
        } else {
            continue;
        };
        let parts: Vec<&str> = size_str.trim().split('x').collect();
        if parts.len() == 2
            && let (Ok(x), Ok(y)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>())
        {
            if is_override {
                return Some((x, y));
            }
            physical = Some((x, y));
        }
    }
    physical
}

/// Escape text for `input text`, which runs through the device shell.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '(' | ')' | '<' | '>' | '|' | ';' | '&' | '*' | '\\' | '~' | '"' | '\'' | '$'
            | '`' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
