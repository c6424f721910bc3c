use crate::automation::TemplateTapRoutine;
use crate::device::{BackendKind, DeviceConfig};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Run,
    Screenshot,
    ListRoutines,
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub device: DeviceConfig,
    pub routine: String,
    pub templates_dir: PathBuf,
    pub threshold: Option<f32>,
    pub capture_interval_ms: Option<u64>,
    pub debug_mode: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            mode: Mode::Run,
            device: DeviceConfig::default(),
            routine: TemplateTapRoutine::NAME.to_string(),
            templates_dir: PathBuf::from("templates"),
            threshold: None,
            capture_interval_ms: None,
            debug_mode: false,
            timeout_secs: None,
        }
    }
}

/// Result of reading the command line.
#[derive(Debug)]
pub enum Parsed {
    Run(Args),
    Help,
    Version,
    Invalid(String),
}

fn value<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("Invalid value for {flag}: {raw}"))
}

impl Args {
    /// Parse the process arguments. Prints help or version and returns `None` when there is
    /// nothing to run; exits with status 2 on a bad argument.
    pub fn parse() -> Option<Self> {
        match Self::parse_from(std::env::args().skip(1)) {
            Parsed::Run(args) => Some(args),
            Parsed::Help => {
                print_help();
                None
            }
            Parsed::Version => {
                println!("ADB Screen Automation v{}", env!("APP_VERSION_DISPLAY"));
                None
            }
            Parsed::Invalid(message) => {
                eprintln!("❌ {message}");
                print_help();
                std::process::exit(2);
            }
        }
    }

    pub fn parse_from<I>(args: I) -> Parsed
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut parsed = Args::default();

        for arg in args {
            let arg = arg.as_ref();
            let result = if arg == "--help" || arg == "-h" {
                return Parsed::Help;
            } else if arg == "--version" || arg == "-v" {
                return Parsed::Version;
            } else if arg == "--debug" {
                parsed.debug_mode = true;
                Ok(())
            } else if arg == "--screenshot" || arg == "-s" {
                parsed.mode = Mode::Screenshot;
                Ok(())
            } else if arg == "--list-routines" {
                parsed.mode = Mode::ListRoutines;
                Ok(())
            } else if let Some(serial) = arg.strip_prefix("--device=") {
                parsed.device.serial = Some(serial.to_string());
                Ok(())
            } else if let Some(raw) = arg.strip_prefix("--host=") {
                value::<Ipv4Addr>("--host", raw).map(|host| parsed.device.host = host)
            } else if let Some(raw) = arg.strip_prefix("--port=") {
                value::<u16>("--port", raw).map(|port| parsed.device.port = port)
            } else if let Some(raw) = arg.strip_prefix("--impl=") {
                match raw {
                    "rust" => {
                        parsed.device.backend = BackendKind::Rust;
                        Ok(())
                    }
                    "shell" => {
                        parsed.device.backend = BackendKind::Shell;
                        Ok(())
                    }
                    other => Err(format!(
                        "Unknown impl '{other}', expected 'rust' or 'shell'"
                    )),
                }
            } else if let Some(name) = arg.strip_prefix("--routine=") {
                parsed.routine = name.to_string();
                Ok(())
            } else if let Some(dir) = arg.strip_prefix("--templates=") {
                parsed.templates_dir = PathBuf::from(dir);
                Ok(())
            } else if let Some(raw) = arg.strip_prefix("--threshold=") {
                value::<f32>("--threshold", raw).and_then(|t| {
                    if (0.0..=1.0).contains(&t) {
                        parsed.threshold = Some(t);
                        Ok(())
                    } else {
                        Err(format!("Threshold must be within 0..=1, got {t}"))
                    }
                })
            } else if let Some(raw) = arg.strip_prefix("--interval=") {
                value::<u64>("--interval", raw).map(|ms| parsed.capture_interval_ms = Some(ms))
            } else if let Some(raw) = arg.strip_prefix("--timeout=") {
                value::<u64>("--timeout", raw).map(|secs| parsed.timeout_secs = Some(secs))
            } else {
                Err(format!("Unknown argument: {arg}"))
            };

            if let Err(message) = result {
                return Parsed::Invalid(message);
            }
        }

        Parsed::Run(parsed)
    }
}

fn print_help() {
    println!("🤖 ADB Screen Automation");
    println!();
    println!("USAGE:");
    println!("    adb-screen-automation [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)            Run the default routine on the first device");
    println!("    --device=SERIAL       Device serial (default: first device on the server)");
    println!("    --host=IP             ADB server address (default: 127.0.0.1)");
    println!("    --port=PORT           ADB server port (default: 5037)");
    println!("    --impl=<shell|rust>   ADB implementation (default: rust)");
    println!("                          The shell implementation requires the adb tool to be installed.");
    println!("    --routine=NAME        Routine to run (default: tap-templates)");
    println!("    --templates=DIR       Template directory (default: templates)");
    println!("    --threshold=T         Match threshold in 0..=1 (default: 0.8)");
    println!("    --interval=MS         Capture interval in milliseconds (default: 500)");
    println!("    --screenshot, -s      Save one screenshot to cli-screenshot.png and exit");
    println!("    --list-routines       List available routines and exit");
    println!("    --timeout=N           Stop after N seconds");
    println!("    --debug               Enable debug logging");
    println!("    --help, -h            Show this help message");
    println!("    --version, -v         Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    adb-screen-automation --screenshot");
    println!("    adb-screen-automation --impl=shell --templates=./icons --threshold=0.9");
    println!("    adb-screen-automation --device=emulator-5554 --timeout=600 --debug");
}
