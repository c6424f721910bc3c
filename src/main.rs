use adb_screen_automation::args::{Args, Mode};
use adb_screen_automation::automation::{
    AutomationConfig, AutomationLoop, AutomationSession, RoutineRegistry,
};
use adb_screen_automation::capture::{DeviceFrameSource, FrameSource};
use adb_screen_automation::device::{DeviceBackend, DeviceControl};
use adb_screen_automation::template_matching::MatchConfig;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const SCREENSHOT_PATH: &str = "cli-screenshot.png";

#[tokio::main]
async fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        return ExitCode::SUCCESS;
    };

    let level = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let registry = RoutineRegistry::<DeviceBackend>::with_builtins(&args.templates_dir);
    if args.mode == Mode::ListRoutines {
        for (name, description) in registry.list() {
            println!("{name:<20} {description}");
        }
        return ExitCode::SUCCESS;
    }

    let mut routine = match registry.create(&args.routine) {
        Ok(routine) => routine,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::from(2);
        }
    };

    let device = match DeviceBackend::connect(&args.device).await {
        Ok(device) => Arc::new(device),
        Err(e) => {
            log::error!("❌ Could not connect: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "📱 Device: {} (backend={:?})",
        device.device_name(),
        device.kind()
    );

    if args.mode == Mode::Screenshot {
        return screenshot(device).await;
    }

    let mut config = AutomationConfig::default();
    if let Some(ms) = args.capture_interval_ms {
        config.capture_interval_ms = ms;
    }
    let mut match_config = MatchConfig::default();
    if let Some(threshold) = args.threshold {
        match_config.threshold = threshold;
    }

    let session = AutomationSession::new(device, config, match_config)
        .with_templates_dir(&args.templates_dir);
    let automation = AutomationLoop::new(session);

    let stop = automation.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("🛑 Ctrl-C received, stopping");
            stop.stop();
        }
    });
    if let Some(secs) = args.timeout_secs {
        let stop = automation.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            log::info!("⏰ Timeout of {secs}s reached, stopping");
            stop.stop();
        });
    }

    match automation.run(routine.as_mut()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("❌ Automation ended: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn screenshot(device: Arc<DeviceBackend>) -> ExitCode {
    let source = DeviceFrameSource::new(device);
    let started = std::time::Instant::now();
    let frame = match source.capture().await {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("❌ Screenshot failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = frame.save(SCREENSHOT_PATH) {
        log::error!("❌ Write failed: {e}");
        return ExitCode::FAILURE;
    }
    println!(
        "✅ Screenshot {}x{} ({}ms) saved to {SCREENSHOT_PATH}",
        frame.width(),
        frame.height(),
        started.elapsed().as_millis()
    );
    ExitCode::SUCCESS
}
