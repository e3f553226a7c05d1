//! Shared types for winmirror.
//!
//! This crate defines the configuration, capture target, loop state machine
//! and the command/event messages exchanged between a host and the engine.

mod commands;
mod error;
mod events;
mod state;
mod types;

pub use commands::EngineCommand;
pub use error::ConfigError;
pub use events::EngineEvent;
pub use state::LoopState;
pub use types::{
    CaptureConfig, CaptureMetrics, CaptureTarget, SourceInfo, SourceKind,
    DEFAULT_TARGET_INTERVAL_MS,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (host → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (engine → host).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
