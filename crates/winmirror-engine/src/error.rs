//! Error types for the engine.

use thiserror::Error;
use winmirror_capture::CaptureError;
use winmirror_ipc::ConfigError;

/// Errors surfaced by the capture controller and engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A capture loop is already running.
    #[error("Capture already running")]
    AlreadyRunning,

    /// The frame source could not be opened.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The configuration was rejected.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A worker thread panicked or exited without reporting.
    #[error("{0} thread terminated unexpectedly")]
    WorkerPanicked(&'static str),
}
