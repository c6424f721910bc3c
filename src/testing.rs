// Shared fixtures for unit tests: synthetic icons, frames and a scriptable device
use crate::capture::Frame;
use crate::device::{
    DeviceConnection, DeviceControl, DeviceError, DeviceResult, KeyCode, WindowHandle,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Deterministic icon made of 4x4 pixel blocks of pseudo-random colour.
pub fn block_icon(seed: u64, width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let block = (u64::from(x / 4) << 16) ^ (u64::from(y / 4) << 32);
        let h = splitmix(seed.wrapping_mul(0x1000_0001) ^ block);
        Rgb([h as u8, (h >> 8) as u8, (h >> 16) as u8])
    })
}

pub fn solid_frame(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Flat background with icons pasted at the given top-left positions.
pub fn compose(width: u32, height: u32, placements: &[(&RgbImage, u32, u32)]) -> RgbImage {
    let mut canvas = solid_frame(width, height, [60, 70, 80]);
    for (icon, x, y) in placements {
        image::imageops::replace(&mut canvas, *icon, i64::from(*x), i64::from(*y));
    }
    canvas
}

pub fn frame(image: RgbImage) -> Frame {
    Frame::new(image, 0).unwrap()
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Tap(u32, u32),
    Swipe(u32, u32, u32, u32, u32),
    Drag(u32, u32, u32, u32, u32),
    Text(String),
    Key(KeyCode),
}

/// In-memory device: serves a fixed screenshot and records every input call.
pub struct MockDevice {
    connection: DeviceConnection,
    screen: Mutex<Vec<u8>>,
    size: Mutex<(u32, u32)>,
    calls: Mutex<Vec<Call>>,
    capture_calls: AtomicUsize,
    fail_captures: AtomicBool,
    failing_actions: AtomicUsize,
    failures_disconnect: AtomicBool,
    probe_ok: AtomicBool,
    probe_calls: AtomicUsize,
    reconnect_calls: AtomicUsize,
    reconnect_after: Mutex<Option<usize>>,
    hanging_reconnects: AtomicUsize,
    origin: (i32, i32),
    target_window: Option<WindowHandle>,
    windows: Mutex<VecDeque<Option<WindowHandle>>>,
}

impl MockDevice {
    pub fn new(screen: RgbImage) -> Self {
        let size = screen.dimensions();
        let device = Self::with_bytes(encode_png(&screen));
        *device.size.lock().unwrap() = size;
        device
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        let connection =
            DeviceConnection::new("mock-5554", SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5037));
        connection.mark_alive();
        Self {
            connection,
            screen: Mutex::new(bytes),
            size: Mutex::new((0, 0)),
            calls: Mutex::new(Vec::new()),
            capture_calls: AtomicUsize::new(0),
            fail_captures: AtomicBool::new(false),
            failing_actions: AtomicUsize::new(0),
            failures_disconnect: AtomicBool::new(false),
            probe_ok: AtomicBool::new(true),
            probe_calls: AtomicUsize::new(0),
            reconnect_calls: AtomicUsize::new(0),
            reconnect_after: Mutex::new(Some(0)),
            hanging_reconnects: AtomicUsize::new(0),
            origin: (0, 0),
            target_window: None,
            windows: Mutex::new(VecDeque::new()),
        }
    }

    /// Desktop-style target: actions must land on `target`; `window_at` answers from `script`
    /// first and from `target` once the script runs out.
    pub fn with_window(mut self, target: WindowHandle, script: Vec<Option<WindowHandle>>) -> Self {
        self.target_window = Some(target);
        self.windows = Mutex::new(script.into());
        self
    }

    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn set_screen(&self, screen: &RgbImage) {
        *self.screen.lock().unwrap() = encode_png(screen);
        *self.size.lock().unwrap() = screen.dimensions();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn taps(&self) -> Vec<(u32, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Tap(x, y) => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn fail_captures_with_disconnect(&self, fail: bool) {
        self.fail_captures.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` input calls fail.
    pub fn fail_next_actions(&self, count: usize, disconnect: bool) {
        self.failing_actions.store(count, Ordering::SeqCst);
        self.failures_disconnect.store(disconnect, Ordering::SeqCst);
    }

    /// Simulate the device dropping off: liveness lost and probes failing.
    pub fn unplug(&self) {
        self.probe_ok.store(false, Ordering::SeqCst);
        self.connection.mark_lost();
    }

    pub fn set_probe(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// `Some(n)`: the n+1-th reconnect attempt succeeds. `None`: reconnect never succeeds.
    pub fn reconnect_succeeds_after(&self, attempts: Option<usize>) {
        *self.reconnect_after.lock().unwrap() = attempts;
    }

    /// The next `count` reconnect attempts never return, like a reopen stuck on a dead socket.
    pub fn hang_next_reconnects(&self, count: usize) {
        self.hanging_reconnects.store(count, Ordering::SeqCst);
    }

    pub fn reconnect_calls(&self) -> usize {
        self.reconnect_calls.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) -> DeviceResult<()> {
        let failing = self
            .failing_actions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(if self.failures_disconnect.load(Ordering::SeqCst) {
                DeviceError::Disconnected {
                    serial: self.connection.serial().to_string(),
                    description: "scripted".to_string(),
                }
            } else {
                DeviceError::AdbBinaryFailed {
                    command: format!("{call:?}"),
                    status: "exit status: 1".to_string(),
                    stderr: "scripted failure".to_string(),
                }
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl DeviceControl for MockDevice {
    fn connection(&self) -> &DeviceConnection {
        &self.connection
    }

    async fn screen_size(&self) -> DeviceResult<(u32, u32)> {
        Ok(*self.size.lock().unwrap())
    }

    async fn capture_bytes(&self) -> DeviceResult<Vec<u8>> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected {
                serial: self.connection.serial().to_string(),
                description: "screencap failed".to_string(),
            });
        }
        Ok(self.screen.lock().unwrap().clone())
    }

    async fn tap(&self, x: u32, y: u32) -> DeviceResult<()> {
        self.record(Call::Tap(x, y))
    }

    async fn swipe(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        self.record(Call::Swipe(x1, y1, x2, y2, duration_ms))
    }

    async fn drag(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> DeviceResult<()> {
        self.record(Call::Drag(x1, y1, x2, y2, duration_ms))
    }

    async fn send_text(&self, text: &str) -> DeviceResult<()> {
        self.record(Call::Text(text.to_string()))
    }

    async fn press_key(&self, key: KeyCode) -> DeviceResult<()> {
        self.record(Call::Key(key))
    }

    async fn check_connection(&self) -> bool {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe_ok.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> DeviceResult<()> {
        let attempt = self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        let hangs = self
            .hanging_reconnects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hangs {
            std::future::pending::<()>().await;
        }
        let after = *self.reconnect_after.lock().unwrap();
        match after {
            Some(n) if attempt >= n => {
                self.probe_ok.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(DeviceError::Disconnected {
                serial: self.connection.serial().to_string(),
                description: "scripted reconnect failure".to_string(),
            }),
        }
    }

    fn target_window(&self) -> Option<WindowHandle> {
        self.target_window
    }

    fn origin(&self) -> (i32, i32) {
        self.origin
    }

    fn window_at(&self, _x: i32, _y: i32) -> Option<WindowHandle> {
        self.windows
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.target_window)
    }
}
