//! Command-line host for winmirror.
//!
//! Lists capture sources, or runs the engine against one target and logs
//! what a display surface would receive.

mod viewer;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use winmirror_capture::{SyntheticDisplay, WindowSystem};
use winmirror_engine::{create_engine, CancellationToken, DeliveryContext};
use winmirror_ipc::{
    CaptureConfig, CaptureTarget, EngineCommand, EngineEvent, LoopState, SourceInfo,
};

use crate::viewer::FrameLog;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "winmirror")]
#[command(about = "Mirror a window or the desktop as a stream of BGR32 frames")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the desktop and capturable top-level windows
    List {
        /// Use the in-process synthetic display instead of the real desktop
        #[arg(long)]
        synthetic: bool,

        /// Print sources as JSON
        #[arg(long)]
        json: bool,
    },

    /// Capture a target and log delivered frames
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// What to capture: `desktop` or `window:<handle>`
    #[arg(long)]
    target: Option<CaptureTarget>,

    /// Milliseconds between capture attempts
    #[arg(long)]
    interval_ms: Option<u32>,

    /// JSON file with a capture configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Use the in-process synthetic display instead of the real desktop
    #[arg(long)]
    synthetic: bool,
}

impl RunArgs {
    /// Configuration file first, then command-line overrides.
    fn resolve_config(&self) -> Result<CaptureConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => CaptureConfig::default(),
        };

        if let Some(target) = self.target {
            config.capture_target = target;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.target_interval_ms = interval_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<CaptureConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid capture configuration in {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::List { synthetic, json } => {
            let sources = if synthetic {
                demo_display().enumerate_sources()?
            } else {
                native_sources()?
            };
            print_sources(&sources, json)
        }
        Command::Run(args) => {
            let config = args.resolve_config()?;
            let duration = args.duration_secs.map(Duration::from_secs);

            let interrupt = CancellationToken::new();
            let handler_token = interrupt.clone();
            ctrlc::set_handler(move || handler_token.cancel())
                .context("Failed to install Ctrl-C handler")?;

            if args.synthetic {
                run_capture(demo_display(), config, duration, &interrupt)?;
            } else {
                run_native(config, duration, &interrupt)?;
            }
            Ok(())
        }
    }
}

/// A synthetic desktop with a couple of windows to pick from.
fn demo_display() -> SyntheticDisplay {
    let display = SyntheticDisplay::new(1920, 1080);
    display.add_window("Terminal", 800, 600);
    display.add_window("Editor", 1280, 720);
    display
}

#[cfg(windows)]
fn native_sources() -> Result<Vec<SourceInfo>> {
    Ok(winmirror_capture::PlatformWindowSystem::default().enumerate_sources()?)
}

#[cfg(not(windows))]
fn native_sources() -> Result<Vec<SourceInfo>> {
    bail!("Native capture is only available on Windows, use --synthetic")
}

#[cfg(windows)]
fn run_native(
    config: CaptureConfig,
    duration: Option<Duration>,
    interrupt: &CancellationToken,
) -> Result<FrameLog> {
    let system = winmirror_capture::PlatformWindowSystem::default();
    run_capture(system, config, duration, interrupt)
}

#[cfg(not(windows))]
fn run_native(
    _config: CaptureConfig,
    _duration: Option<Duration>,
    _interrupt: &CancellationToken,
) -> Result<FrameLog> {
    bail!("Native capture is only available on Windows, use --synthetic")
}

fn print_sources(sources: &[SourceInfo], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sources)?);
        return Ok(());
    }

    for source in sources {
        let process = source
            .process_id
            .map(|pid| format!(" pid {pid}"))
            .unwrap_or_default();
        println!(
            "{:<24} {:>5}x{:<5}{}  {}",
            source.target.to_string(),
            source.width,
            source.height,
            process,
            source.name
        );
    }
    Ok(())
}

/// Run the engine on its own thread until `duration` elapses, `interrupt`
/// fires or the engine goes away, then shut everything down in order.
///
/// Returns what the consumer received.
fn run_capture<W: WindowSystem>(
    system: W,
    config: CaptureConfig,
    duration: Option<Duration>,
    interrupt: &CancellationToken,
) -> Result<FrameLog> {
    info!(
        capture_target = %config.capture_target,
        interval_ms = config.target_interval_ms,
        "Starting capture"
    );

    let (command_tx, command_rx) = winmirror_ipc::command_channel();
    let (event_tx, event_rx) = winmirror_ipc::event_channel();
    let delivery = DeliveryContext::spawn(FrameLog::default());

    let sink = delivery.sink();
    let engine_handle = thread::spawn(move || {
        info!("Engine thread starting");
        let mut engine = create_engine(system, sink, command_rx, event_tx);
        engine.run();
        info!("Engine thread stopped");
    });

    let outcome = start_and_watch(&command_tx, &event_rx, config, duration, interrupt);

    let _ = command_tx.send(EngineCommand::Shutdown);
    drop(command_tx);
    if engine_handle.join().is_err() {
        warn!("Engine thread panicked");
    }

    let log = delivery.shutdown()?;
    info!(
        frames = log.frames(),
        malformed = log.malformed(),
        fps = %format_args!("{:.1}", log.average_fps()),
        megabytes = %format_args!("{:.1}", log.megabytes()),
        "Capture finished"
    );

    outcome.map(|()| log)
}

fn start_and_watch(
    command_tx: &Sender<EngineCommand>,
    event_rx: &Receiver<EngineEvent>,
    config: CaptureConfig,
    duration: Option<Duration>,
    interrupt: &CancellationToken,
) -> Result<()> {
    command_tx
        .send(EngineCommand::Start { config })
        .context("Engine is not accepting commands")?;

    wait_for_start(event_rx)?;

    let deadline = duration.map(|d| Instant::now() + d);
    loop {
        if interrupt.is_cancelled() {
            info!("Interrupted, stopping capture");
            break;
        }

        let timeout = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                (deadline - now).min(EVENT_POLL_INTERVAL)
            }
            None => EVENT_POLL_INTERVAL,
        };

        match event_rx.recv_timeout(timeout) {
            Ok(EngineEvent::Shutdown) => break,
            Ok(event) => log_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => bail!("Engine stopped unexpectedly"),
        }
    }

    command_tx
        .send(EngineCommand::Stop)
        .context("Engine is not accepting commands")?;
    Ok(())
}

/// Wait until the engine confirms the configuration or reports why it could
/// not start.
fn wait_for_start(event_rx: &Receiver<EngineEvent>) -> Result<()> {
    let deadline = Instant::now() + STARTUP_TIMEOUT;
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match event_rx.recv_timeout(timeout) {
            Ok(EngineEvent::ConfigApplied(config)) => {
                info!(capture_target = %config.capture_target, "Capture running");
                return Ok(());
            }
            Ok(EngineEvent::Error { message, .. }) => bail!("Capture failed to start: {message}"),
            Ok(event) => log_event(&event),
            Err(e) => bail!("Timeout waiting for the engine to start: {e}"),
        }
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Metrics(metrics) => info!(
            fps = %format_args!("{:.1}", metrics.fps),
            target_fps = %format_args!("{:.1}", metrics.target_fps),
            delivered = metrics.frames_delivered,
            empty = metrics.empty_attempts,
            dropped = metrics.sink_drops,
            size = %format_args!("{}x{}", metrics.last_width, metrics.last_height),
            "Capture stats"
        ),
        EngineEvent::StateChanged { previous, current } => {
            debug!(
                previous = previous.name(),
                current = current.name(),
                "Loop state"
            );
            if *current == LoopState::Stopped {
                warn!("Capture loop stopped");
            }
        }
        EngineEvent::Error { message, .. } => warn!("Engine error: {}", message),
        other => debug!(?other, "Engine event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config_file() {
        let path = std::env::temp_dir().join(format!("winmirror-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{"target_interval_ms": 40, "capture_target": "window:0x1000"}"#,
        )
        .unwrap();

        let args = RunArgs {
            target: None,
            interval_ms: Some(20),
            config: Some(path.clone()),
            duration_secs: None,
            synthetic: true,
        };
        let config = args.resolve_config().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.target_interval_ms, 20);
        assert_eq!(config.capture_target, CaptureTarget::Window(0x1000));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let args = RunArgs {
            target: None,
            interval_ms: Some(0),
            config: None,
            duration_secs: None,
            synthetic: true,
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_parses_run_arguments() {
        let cli = Cli::try_parse_from([
            "winmirror",
            "run",
            "--target",
            "window:4096",
            "--interval-ms",
            "33",
            "--synthetic",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.target, Some(CaptureTarget::Window(4096)));
        assert_eq!(args.interval_ms, Some(33));
        assert!(args.synthetic);
    }

    #[test]
    fn test_synthetic_run_delivers_frames() {
        let config = CaptureConfig {
            target_interval_ms: 5,
            capture_target: CaptureTarget::Desktop,
        };
        let interrupt = CancellationToken::new();
        let log = run_capture(
            demo_display(),
            config,
            Some(Duration::from_millis(100)),
            &interrupt,
        )
        .unwrap();

        assert!(log.frames() > 0);
        assert_eq!(log.malformed(), 0);
    }

    #[test]
    fn test_interrupt_stops_open_ended_run() {
        let display = demo_display();
        let config = CaptureConfig {
            target_interval_ms: 5,
            capture_target: CaptureTarget::Desktop,
        };
        let interrupt = CancellationToken::new();
        let trigger = interrupt.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            trigger.cancel();
        });

        let log = run_capture(display.clone(), config, None, &interrupt).unwrap();
        handle.join().unwrap();

        assert!(log.frames() > 0);
        assert_eq!(display.live_surfaces(), 0);
        assert_eq!(display.released_total(), display.acquired_total());
    }

    #[test]
    fn test_unknown_window_fails_to_start() {
        let config = CaptureConfig::for_target(CaptureTarget::Window(0xbad));
        let interrupt = CancellationToken::new();
        let result = run_capture(
            demo_display(),
            config,
            Some(Duration::from_millis(50)),
            &interrupt,
        );
        assert!(result.is_err());
    }
}
