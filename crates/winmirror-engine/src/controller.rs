//! Lifecycle of the capture worker.
//!
//! At most one frame source exists per controller. Any reconfiguration
//! (new target, new interval) cancels the running loop, waits for it to reach
//! `Stopped`, and only then opens a fresh frame source on a new worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, instrument};
use winmirror_capture::{FrameSource, WindowSystem};
use winmirror_ipc::{CaptureConfig, CaptureTarget, LoopState};

use crate::cancel::CancellationToken;
use crate::capture_loop::CaptureLoop;
use crate::delivery::FrameSink;
use crate::error::EngineError;
use crate::metrics::MetricsCollector;
use crate::status::LoopStatus;

struct ActiveCapture {
    token: CancellationToken,
    status: LoopStatus,
    metrics: Arc<MetricsCollector>,
    handle: JoinHandle<()>,
}

/// Starts, stops and reconfigures capture loops on a dedicated worker.
pub struct CaptureController<W, S>
where
    W: WindowSystem,
    S: FrameSink + Clone + Send + 'static,
{
    system: W,
    sink: S,
    config: CaptureConfig,
    active: Option<ActiveCapture>,
}

impl<W, S> CaptureController<W, S>
where
    W: WindowSystem,
    S: FrameSink + Clone + Send + 'static,
{
    /// Create an idle controller. Each started loop gets a clone of `sink`.
    pub fn new(system: W, sink: S) -> Self {
        Self {
            system,
            sink,
            config: CaptureConfig::default(),
            active: None,
        }
    }

    /// Open a frame source for `config` and start capturing.
    ///
    /// Returns once the frame source is open, or with the error that
    /// prevented it. A loop that is still winding down is waited for first.
    #[instrument(name = "controller_start", skip(self, config), fields(target = %config.capture_target))]
    pub fn start(&mut self, config: CaptureConfig) -> Result<(), EngineError> {
        config.validate()?;

        if let Some(active) = &self.active {
            if !active.token.is_cancelled() {
                return Err(EngineError::AlreadyRunning);
            }
        }
        self.join_active()?;

        let token = CancellationToken::new();
        let capture_loop = CaptureLoop::new(config.target_interval(), token.clone());
        let status = capture_loop.status();
        let metrics = capture_loop.metrics();

        let system = self.system.clone();
        let mut sink = self.sink.clone();
        let target = config.capture_target;
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = thread::spawn(move || {
            // Handles stay on this thread from open to close.
            match FrameSource::open(system, target) {
                Ok(source) => {
                    let _ = ready_tx.send(Ok(()));
                    capture_loop.run(source, &mut sink);
                }
                Err(e) => {
                    let status = capture_loop.status();
                    status.transition(LoopState::Stopped);
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let opened = ready_rx
            .recv()
            .map_err(|_| EngineError::WorkerPanicked("capture"))?;

        if let Err(e) = opened {
            error!("Frame source open failed: {}", e);
            let _ = handle.join();
            return Err(e.into());
        }

        self.config = config;
        self.active = Some(ActiveCapture {
            token,
            status,
            metrics,
            handle,
        });

        info!("Capture started");
        Ok(())
    }

    /// Cancel the running loop and wait until its resources are released.
    #[instrument(name = "controller_stop", skip(self))]
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(active) = &self.active else {
            debug!("Not running, ignoring stop");
            return Ok(());
        };

        active.token.cancel();
        self.join_active()?;
        info!("Capture stopped");
        Ok(())
    }

    /// Capture a different target. Restarts the loop if it was running.
    pub fn retarget(&mut self, target: CaptureTarget) -> Result<(), EngineError> {
        let config = CaptureConfig {
            capture_target: target,
            ..self.config.clone()
        };
        self.reconfigure(config)
    }

    /// Change the capture interval. Restarts the loop if it was running.
    pub fn set_interval(&mut self, target_interval_ms: u32) -> Result<(), EngineError> {
        let config = CaptureConfig {
            target_interval_ms,
            ..self.config.clone()
        };
        self.reconfigure(config)
    }

    /// Replace the configuration, restarting the loop if it was running.
    pub fn reconfigure(&mut self, config: CaptureConfig) -> Result<(), EngineError> {
        config.validate()?;

        if self.is_running() {
            self.stop()?;
            self.start(config)
        } else {
            self.join_active()?;
            self.config = config;
            Ok(())
        }
    }

    fn join_active(&mut self) -> Result<(), EngineError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        active.token.cancel();
        active
            .handle
            .join()
            .map_err(|_| EngineError::WorkerPanicked("capture"))?;
        debug!(state = active.status.get().name(), "Capture worker joined");
        Ok(())
    }

    /// Returns true while a loop is running and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.token.is_cancelled() && !active.status.get().is_stopped())
    }

    /// State of the current (or most recent) loop; `Stopped` when idle.
    pub fn state(&self) -> LoopState {
        self.active
            .as_ref()
            .map_or(LoopState::Stopped, |active| active.status.get())
    }

    /// Status handle of the current loop.
    pub fn status(&self) -> Option<LoopStatus> {
        self.active.as_ref().map(|active| active.status.clone())
    }

    /// Metrics of the current loop.
    pub fn metrics(&self) -> Option<Arc<MetricsCollector>> {
        self.active.as_ref().map(|active| Arc::clone(&active.metrics))
    }

    /// The configuration of the current or next loop.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// The window system loops are started against.
    pub fn window_system(&self) -> &W {
        &self.system
    }
}

impl<W, S> Drop for CaptureController<W, S>
where
    W: WindowSystem,
    S: FrameSink + Clone + Send + 'static,
{
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
