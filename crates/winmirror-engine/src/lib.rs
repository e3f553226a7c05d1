//! Capture loop and frame delivery for winmirror.
//!
//! The engine runs one [`CaptureLoop`] per capture session on a dedicated
//! worker, paces it to the configured interval, and posts each frame to a
//! [`DeliveryContext`] owned by the consumer. [`CaptureController`] serializes
//! reconfiguration and [`Engine`] drives it from [`EngineCommand`]s.

mod cancel;
mod capture_loop;
mod controller;
mod delivery;
mod error;
mod metrics;
mod orchestrator;
mod pacing;
mod status;

pub use cancel::CancellationToken;
pub use capture_loop::{run_capture_loop, CaptureLoop};
pub use controller::CaptureController;
pub use delivery::{frame_channel, ChannelSink, DeliveryContext, FrameSink, FRAME_CHANNEL_CAPACITY};
pub use error::EngineError;
pub use metrics::MetricsCollector;
pub use orchestrator::Engine;
pub use pacing::{FramePacer, SLEEP_INCREMENT};
pub use status::LoopStatus;

use crossbeam_channel::{Receiver, Sender};
use winmirror_capture::WindowSystem;
use winmirror_ipc::{EngineCommand, EngineEvent};

/// Create an engine instance with IPC channels.
pub fn create_engine<W, S>(
    system: W,
    sink: S,
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
) -> Engine<W, S>
where
    W: WindowSystem,
    S: FrameSink + Clone + Send + 'static,
{
    Engine::new(system, sink, command_rx, event_tx)
}
