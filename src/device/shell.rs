use super::error::{DeviceError, DeviceResult};
use super::types::{
    DeviceConfig, DeviceConnection, DeviceControl, KeyCode, escape_input_text, parse_wm_size,
};
use std::time::Duration;
use tokio::process::Command;

const SHELL_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Device control through the `adb` executable from Android Platform Tools.
pub struct AdbShell {
    connection: DeviceConnection,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ListedDevice {
    pub serial: String,
    pub state: String,
    pub transport_id: Option<String>,
}

impl AdbShell {
    pub async fn connect(config: &DeviceConfig) -> DeviceResult<Self> {
        let endpoint = config.endpoint();
        let serial = match &config.serial {
            Some(serial) => serial.clone(),
            None => {
                let out = Self::server_command(config, &["devices", "-l"], SHELL_TIMEOUT).await?;
                Self::parse_devices(&String::from_utf8_lossy(&out))
                    .into_iter()
                    .find(|d| d.state == "device")
                    .map(|d| d.serial)
                    .ok_or_else(|| DeviceError::NotConnected {
                        serial: "<any>".to_string(),
                    })?
            }
        };

        let shell = Self {
            connection: DeviceConnection::new(serial, endpoint),
        };
        if !shell.check_connection().await {
            return Err(DeviceError::NotConnected {
                serial: shell.connection.serial().to_string(),
            });
        }
        shell.connection.mark_alive();
        log::info!(
            "✅ AdbShell: connected to {} via {}",
            shell.connection.serial(),
            endpoint
        );
        Ok(shell)
    }

    /// Parse `adb devices -l` output.
    pub fn parse_devices(output: &str) -> Vec<ListedDevice> {
        output
            .lines()
            .skip_while(|line| !line.starts_with("List of devices"))
            .skip(1)
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let serial = parts.next()?;
                let state = parts.next()?;
                let transport_id = parts
                    .find_map(|p| p.strip_prefix("transport_id:"))
                    .map(str::to_string);
                Some(ListedDevice {
                    serial: serial.to_string(),
                    state: state.to_string(),
                    transport_id,
                })
            })
            .collect()
    }

    fn base_command(host: &str, port: u16) -> Command {
        let mut cmd = Command::new("adb");
        cmd.arg("-H").arg(host).arg("-P").arg(port.to_string());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn server_command(
        config: &DeviceConfig,
        args: &[&str],
        timeout: Duration,
    ) -> DeviceResult<Vec<u8>> {
        let mut cmd = Self::base_command(&config.host.to_string(), config.port);
        cmd.args(args);
        Self::output(cmd, args, timeout).await
    }

    async fn device_command(&self, args: &[&str], timeout: Duration) -> DeviceResult<Vec<u8>> {
        let endpoint = self.connection.endpoint();
        let mut cmd = Self::base_command(&endpoint.ip().to_string(), endpoint.port());
        cmd.arg("-s").arg(self.connection.serial()).args(args);
        Self::output(cmd, args, timeout).await
    }

    async fn output(mut cmd: Command, args: &[&str], timeout: Duration) -> DeviceResult<Vec<u8>> {
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DeviceError::Timeout {
                    duration: timeout,
                    description: format!("adb {}", args.join(" ")),
                });
            }
        };
        if !output.status.success() {
            return Err(DeviceError::AdbBinaryFailed {
                command: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn input(&self, args: &[&str]) -> DeviceResult<()> {
        let mut command = vec!["shell", "input"];
        command.extend_from_slice(args);
        self.device_command(&command, SHELL_TIMEOUT).await.map(|_| ())
    }
}

impl DeviceControl for AdbShell {
    fn connection(&self) -> &DeviceConnection {
        &self.connection
    }

    async fn screen_size(&self) -> DeviceResult<(u32, u32)> {
        let out = self.device_command(&["shell", "wm", "size"], SHELL_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&out);
        parse_wm_size(&stdout).ok_or_else(|| DeviceError::ScreenSizeParseFailed {
            output: stdout.trim().to_string(),
        })
    }

    async fn capture_bytes(&self) -> DeviceResult<Vec<u8>> {
        self.device_command(&["exec-out", "screencap", "-p"], CAPTURE_TIMEOUT)
            .await
    }

    async fn tap(&self, x: u32, y: u32) -> DeviceResult<()> {
        let (xs, ys) = (x.to_string(), y.to_string());
        self.input(&["tap", &xs, &ys]).await
    }

    async fn swipe(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        let parts = [x1, y1, x2, y2, duration_ms].map(|v| v.to_string());
        let mut args = vec!["swipe"];
        args.extend(parts.iter().map(String::as_str));
        self.input(&args).await
    }

    async fn drag(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        let parts = [x1, y1, x2, y2, duration_ms].map(|v| v.to_string());
        let mut args = vec!["draganddrop"];
        args.extend(parts.iter().map(String::as_str));
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
        match self.device_command(&["get-state"], PROBE_TIMEOUT).await {
            Ok(out) => String::from_utf8_lossy(&out).trim() == "device",
            Err(e) => {
                log::debug!("AdbShell: liveness probe failed: {e}");
                false
            }
        }
    }

    async fn reconnect(&self) -> DeviceResult<()> {
        let serial = self.connection.serial();
        // Network devices drop off the server entirely and must be re-attached
        if serial.contains(':') {
            let endpoint = self.connection.endpoint();
            let mut cmd = Self::base_command(&endpoint.ip().to_string(), endpoint.port());
            let args = ["connect", serial];
            cmd.args(args);
            let out = Self::output(cmd, &args, SHELL_TIMEOUT).await?;
            log::info!(
                "🔌 AdbShell: {}",
                String::from_utf8_lossy(&out).trim()
            );
        }
        if self.check_connection().await {
            Ok(())
        } else {
            Err(DeviceError::Disconnected {
                serial: serial.to_string(),
                description: "get-state did not report 'device'".to_string(),
            })
        }
    }
}
