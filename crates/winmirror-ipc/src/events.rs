//! Events sent from the engine to a host.

use serde::{Deserialize, Serialize};

use crate::state::LoopState;
use crate::types::{CaptureConfig, CaptureMetrics, SourceInfo};

/// Events that the engine can send to a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Capture loop state has changed.
    StateChanged {
        /// Previous state.
        previous: LoopState,

        /// Current state.
        current: LoopState,
    },

    /// Reply to `GetState`.
    State(LoopState),

    /// The configuration the engine is now capturing with.
    ConfigApplied(CaptureConfig),

    /// Updated capture metrics.
    Metrics(CaptureMetrics),

    /// Error occurred.
    Error {
        /// Whether the engine can keep accepting commands.
        recoverable: bool,

        /// Error message.
        message: String,
    },

    /// List of capturable sources.
    Sources(Vec<SourceInfo>),

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}
