//! The timed, cancellable capture loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};
use winmirror_capture::{FrameSource, WindowSystem};
use winmirror_ipc::LoopState;

use crate::cancel::CancellationToken;
use crate::delivery::FrameSink;
use crate::metrics::MetricsCollector;
use crate::pacing::FramePacer;
use crate::status::LoopStatus;

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Drives one frame source at a target rate until cancelled.
pub struct CaptureLoop {
    pacer: FramePacer,
    token: CancellationToken,
    status: LoopStatus,
    metrics: Arc<MetricsCollector>,
}

impl CaptureLoop {
    /// Create a loop in the `Created` state.
    pub fn new(target_interval: Duration, token: CancellationToken) -> Self {
        Self {
            pacer: FramePacer::new(target_interval),
            token,
            status: LoopStatus::new(),
            metrics: Arc::new(MetricsCollector::new(target_interval)),
        }
    }

    /// Handle for observing this loop's state.
    pub fn status(&self) -> LoopStatus {
        self.status.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Run until the token is cancelled, then close `source`.
    ///
    /// Frames go to `sink` in capture order. Attempts that produce no frame
    /// are skipped. The source is closed before this returns, whichever phase
    /// cancellation arrived in.
    #[instrument(
        name = "capture_loop_run",
        skip_all,
        fields(target = %source.target(), interval_ms = self.pacer.interval().as_millis() as u64)
    )]
    pub fn run<W, S>(&self, mut source: FrameSource<W>, sink: &mut S)
    where
        W: WindowSystem,
        S: FrameSink + ?Sized,
    {
        if !self.token.is_cancelled() {
            self.status.transition(LoopState::Running);
            info!("Capture loop started");
        }

        self.metrics.start();
        let started = Instant::now();
        let mut last_log_time = started;
        let mut delivered: u64 = 0;
        let mut empty: u64 = 0;
        let drops_at_start = sink.dropped();

        while !self.token.is_cancelled() {
            let iteration_start = Instant::now();

            match source.capture() {
                Some(frame) => {
                    delivered += 1;
                    if delivered <= 3 || delivered % 300 == 0 {
                        debug!(
                            "Frame #{}: {}x{} stride {}",
                            frame.sequence, frame.width, frame.height, frame.stride
                        );
                    }
                    self.metrics.record_frame(&frame);
                    sink.deliver(frame);
                    self.metrics
                        .record_sink_drops(sink.dropped().saturating_sub(drops_at_start));
                }
                None => {
                    empty += 1;
                    self.metrics.record_empty_attempt();
                }
            }

            if last_log_time.elapsed() >= STATS_LOG_INTERVAL {
                info!(
                    "Capture stats: delivered={}, empty={}, uptime={:.1}s",
                    delivered,
                    empty,
                    started.elapsed().as_secs_f32()
                );
                last_log_time = Instant::now();
            }

            if !self.pacer.wait(iteration_start, &self.token) {
                break;
            }
        }

        self.status.transition(LoopState::Cancelling);
        source.close();
        self.metrics.stop();
        self.status.transition(LoopState::Stopped);

        info!(
            "Capture loop stopped: delivered={}, empty={}, uptime={:.1}s",
            delivered,
            empty,
            started.elapsed().as_secs_f32()
        );
    }
}

/// Run a capture loop on the current thread with a fresh status handle.
pub fn run_capture_loop<W, S>(
    source: FrameSource<W>,
    sink: &mut S,
    target_interval: Duration,
    token: CancellationToken,
) where
    W: WindowSystem,
    S: FrameSink + ?Sized,
{
    CaptureLoop::new(target_interval, token).run(source, sink);
}
