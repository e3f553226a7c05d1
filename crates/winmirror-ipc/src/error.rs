//! Configuration errors.

use thiserror::Error;

/// Errors produced while parsing or validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The capture interval must be a positive number of milliseconds.
    #[error("target interval must be at least 1 ms")]
    ZeroInterval,

    /// A capture target string could not be parsed.
    #[error("invalid capture target {0:?} (expected \"desktop\" or \"window:<handle>\")")]
    InvalidTarget(String),
}
