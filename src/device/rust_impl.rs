// https://crates.io/crates/adb_client
use super::error::{DeviceError, DeviceResult};
use super::types::{
    DeviceConfig, DeviceConnection, DeviceControl, KeyCode, escape_input_text, parse_wm_size,
};
use adb_client::{ADBDeviceExt, ADBServer, ADBServerDevice};
use std::net::SocketAddrV4;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

const SHELL_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// The live device handle. Commands clone the current handle; reconnect installs a new
/// one without touching the old lock, which a command stuck on a dead transport may hold.
struct DeviceSlot<T> {
    current: RwLock<Arc<Mutex<T>>>,
}

impl<T> DeviceSlot<T> {
    fn new(device: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(Mutex::new(device))),
        }
    }

    fn current(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace(&self, device: T) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Mutex::new(device));
    }
}

/// Device control over the ADB server protocol, no `adb` binary required.
pub struct RustAdb {
    connection: DeviceConnection,
    server_device: DeviceSlot<ADBServerDevice>,
}

impl RustAdb {
    /// Open the configured device (or the server's first device) and mark it alive.
    pub async fn connect(config: &DeviceConfig) -> DeviceResult<Self> {
        let endpoint = config.endpoint();
        let requested = config.serial.clone();
        let (serial, device) =
            tokio::task::spawn_blocking(move || Self::open(endpoint, requested)).await??;

        let connection = DeviceConnection::new(serial, endpoint);
        connection.mark_alive();
        log::info!(
            "✅ RustAdb: connected to {} via {}",
            connection.serial(),
            endpoint
        );
        Ok(Self {
            connection,
            server_device: DeviceSlot::new(device),
        })
    }

    fn open(
        endpoint: SocketAddrV4,
        serial: Option<String>,
    ) -> DeviceResult<(String, ADBServerDevice)> {
        let mut server = ADBServer::new(endpoint);
        let serial = match serial {
            Some(serial) => serial,
            None => {
                let devices = server
                    .devices()
                    .map_err(|source| DeviceError::ConnectionFailed {
                        serial: "<any>".to_string(),
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                devices
                    .into_iter()
                    .next()
                    .map(|d| d.identifier)
                    .ok_or_else(|| DeviceError::NotConnected {
                        serial: "<any>".to_string(),
                    })?
            }
        };
        let device =
            server
                .get_device_by_name(&serial)
                .map_err(|source| DeviceError::ConnectionFailed {
                    serial: serial.clone(),
                    endpoint: endpoint.to_string(),
                    source,
                })?;
        Ok((serial, device))
    }

    /// Run a shell command on a blocking thread so the timeout can fire on a hung transport.
    async fn shell(&self, command: &[&str], timeout: Duration) -> DeviceResult<Vec<u8>> {
        let server_device = self.server_device.current();
        let owned: Vec<String> = command.iter().map(|s| s.to_string()).collect();

        let task = tokio::task::spawn_blocking(move || -> DeviceResult<Vec<u8>> {
            let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
            let mut out: Vec<u8> = Vec::new();
            let mut dev = server_device.blocking_lock();
            dev.shell_command(&refs, &mut out)
                .map_err(|e| DeviceError::from_shell_error(&refs, e))?;
            Ok(out)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(DeviceError::Timeout {
                duration: timeout,
                description: format!("RustAdb: '{}' (device may be disconnected)", command.join(" ")),
            }),
        }
    }

    async fn input(&self, args: &[&str]) -> DeviceResult<()> {
        let mut command = vec!["input"];
        command.extend_from_slice(args);
        self.shell(&command, SHELL_TIMEOUT).await.map(|_| ())
    }
}

impl DeviceControl for RustAdb {
    fn connection(&self) -> &DeviceConnection {
        &self.connection
    }

    async fn screen_size(&self) -> DeviceResult<(u32, u32)> {
        let out = self.shell(&["wm", "size"], SHELL_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&out);
        parse_wm_size(&stdout).ok_or_else(|| DeviceError::ScreenSizeParseFailed {
            output: stdout.trim().to_string(),
        })
    }

    async fn capture_bytes(&self) -> DeviceResult<Vec<u8>> {
        self.shell(&["screencap", "-p"], CAPTURE_TIMEOUT).await
    }

    async fn tap(&self, x: u32, y: u32) -> DeviceResult<()> {
        let (xs, ys) = (x.to_string(), y.to_string());
        self.input(&["tap", &xs, &ys]).await
    }

    async fn swipe(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        let parts = [x1, y1, x2, y2, duration_ms].map(|v| v.to_string());
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let mut args = vec!["swipe"];
        args.extend(refs);
        self.input(&args).await
    }

    async fn drag(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        let parts = [x1, y1, x2, y2, duration_ms].map(|v| v.to_string());
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let mut args = vec!["draganddrop"];
        args.extend(refs);
        self.input(&args).await
    }

    async fn send_text(&self, text: &str) -> DeviceResult<()> {
        let escaped = escape_input_text(text);
        self.input(&["text", &escaped]).await
    }

    async fn press_key(&self, key: KeyCode) -> DeviceResult<()> {
        let code = key.0.to_string();
        self.input(&["keyevent", &code]).await
    }

    async fn check_connection(&self) -> bool {
        match self.shell(&["echo", "alive"], PROBE_TIMEOUT).await {
            Ok(out) => String::from_utf8_lossy(&out).contains("alive"),
            Err(e) => {
                log::debug!("RustAdb: liveness probe failed: {e}");
                false
            }
        }
    }

    async fn reconnect(&self) -> DeviceResult<()> {
        let endpoint = self.connection.endpoint();
        let serial = self.connection.serial().to_string();
        let opening = tokio::task::spawn_blocking(move || Self::open(endpoint, Some(serial)));
        let (_, device) = match tokio::time::timeout(SHELL_TIMEOUT, opening).await {
            Ok(joined) => joined??,
            Err(_) => {
                return Err(DeviceError::Timeout {
                    duration: SHELL_TIMEOUT,
                    description: format!("RustAdb: re-opening {}", self.connection.serial()),
                });
            }
        };
        self.server_device.replace(device);
        log::info!("🔌 RustAdb: re-opened {}", self.connection.serial());
        Ok(())
    }
}
