//! Commands sent from a host to the engine.

use serde::{Deserialize, Serialize};

use crate::types::{CaptureConfig, CaptureTarget};

/// Commands that a host can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineCommand {
    /// Start capturing with the given configuration.
    Start { config: CaptureConfig },

    /// Stop the current capture.
    Stop,

    /// Switch to a different target (restarts the loop if running).
    SetTarget(CaptureTarget),

    /// Change the capture interval in milliseconds (restarts the loop if running).
    SetInterval(u32),

    /// Request the list of capturable sources.
    GetSources,

    /// Request the current loop state.
    GetState,

    /// Shutdown the engine completely.
    Shutdown,
}
