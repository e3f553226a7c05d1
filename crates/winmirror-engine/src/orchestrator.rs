//! Command-driven engine.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, instrument, warn};

use winmirror_capture::WindowSystem;
use winmirror_ipc::{CaptureConfig, CaptureTarget, EngineCommand, EngineEvent, LoopState};

use crate::controller::CaptureController;
use crate::delivery::FrameSink;
use crate::error::EngineError;

const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(100);
const METRICS_INTERVAL: Duration = Duration::from_secs(1);

/// Owns a [`CaptureController`] and drives it from host commands.
pub struct Engine<W, S>
where
    W: WindowSystem,
    S: FrameSink + Clone + Send + 'static,
{
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    controller: CaptureController<W, S>,
    last_state: LoopState,
    last_metrics_time: Instant,
}

impl<W, S> Engine<W, S>
where
    W: WindowSystem,
    S: FrameSink + Clone + Send + 'static,
{
    /// Create a new engine. Captured frames go to clones of `sink`.
    pub fn new(
        system: W,
        sink: S,
        command_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
    ) -> Self {
        Self {
            command_rx,
            event_tx,
            controller: CaptureController::new(system, sink),
            last_state: LoopState::Stopped,
            last_metrics_time: Instant::now(),
        }
    }

    /// Run the engine (blocking) until `Shutdown` or the command channel
    /// closes.
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(EngineEvent::Ready);

        loop {
            match self.command_rx.recv_timeout(COMMAND_POLL_INTERVAL) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.stop_capture();
                    break;
                }
            }

            self.publish_state();
            if self.controller.is_running() && self.last_metrics_time.elapsed() >= METRICS_INTERVAL
            {
                self.emit_metrics();
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if the engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            EngineCommand::Start { config } => self.start_capture(config),
            EngineCommand::Stop => self.stop_capture(),
            EngineCommand::SetTarget(target) => self.set_target(target),
            EngineCommand::SetInterval(ms) => self.set_interval(ms),
            EngineCommand::GetSources => self.send_sources(),
            EngineCommand::GetState => self.send_state(),
            EngineCommand::Shutdown => {
                self.stop_capture();
                self.publish_state();
                self.send_event(EngineEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn start_capture(&mut self, config: CaptureConfig) {
        if self.controller.is_running() {
            debug!("Already capturing, applying configuration by restart");
            self.apply(|controller| controller.reconfigure(config));
            return;
        }

        match self.controller.start(config) {
            Ok(()) => {
                self.last_metrics_time = Instant::now();
                self.send_event(EngineEvent::ConfigApplied(self.controller.config().clone()));
            }
            Err(e) => self.report_error(e),
        }
    }

    fn stop_capture(&mut self) {
        if let Err(e) = self.controller.stop() {
            self.report_error(e);
        }
    }

    fn set_target(&mut self, target: CaptureTarget) {
        self.apply(|controller| controller.retarget(target));
    }

    fn set_interval(&mut self, target_interval_ms: u32) {
        self.apply(|controller| controller.set_interval(target_interval_ms));
    }

    fn apply(
        &mut self,
        change: impl FnOnce(&mut CaptureController<W, S>) -> Result<(), EngineError>,
    ) {
        match change(&mut self.controller) {
            Ok(()) => self.send_event(EngineEvent::ConfigApplied(self.controller.config().clone())),
            Err(e) => self.report_error(e),
        }
    }

    fn send_sources(&self) {
        match self.controller.window_system().enumerate_sources() {
            Ok(sources) => self.send_event(EngineEvent::Sources(sources)),
            Err(e) => {
                warn!("Source enumeration failed: {}", e);
                self.send_event(EngineEvent::Sources(Vec::new()));
            }
        }
    }

    fn send_state(&self) {
        self.send_event(EngineEvent::State(self.controller.state()));
    }

    fn publish_state(&mut self) {
        let current = self.controller.state();
        if current != self.last_state {
            debug!(
                previous = self.last_state.name(),
                current = current.name(),
                "State transition"
            );
            self.send_event(EngineEvent::StateChanged {
                previous: self.last_state,
                current,
            });
            self.last_state = current;
        }
    }

    fn emit_metrics(&mut self) {
        if let Some(metrics) = self.controller.metrics() {
            self.send_event(EngineEvent::Metrics(metrics.snapshot()));
            metrics.mark_reported();
        }
        self.last_metrics_time = Instant::now();
    }

    fn report_error(&self, e: EngineError) {
        error!("Engine command failed: {}", e);
        self.send_event(EngineEvent::Error {
            recoverable: true,
            message: e.to_string(),
        });
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}
