//! Common types used across the engine and its hosts.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default interval between capture attempts (about 60 frames per second).
pub const DEFAULT_TARGET_INTERVAL_MS: u32 = 16;

/// Identifies what to capture: the whole desktop or one window.
///
/// The handle is opaque to the engine and re-validated on every capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CaptureTarget {
    /// The desktop (virtual screen).
    #[default]
    Desktop,

    /// A top-level window, by native handle.
    Window(isize),
}

impl CaptureTarget {
    /// Returns true for the desktop sentinel.
    pub fn is_desktop(&self) -> bool {
        matches!(self, Self::Desktop)
    }
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desktop => f.write_str("desktop"),
            Self::Window(handle) => write!(f, "window:{handle}"),
        }
    }
}

impl FromStr for CaptureTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("desktop") {
            return Ok(Self::Desktop);
        }

        trimmed
            .strip_prefix("window:")
            .and_then(|handle| parse_handle(handle.trim()))
            .map(Self::Window)
            .ok_or_else(|| ConfigError::InvalidTarget(s.to_string()))
    }
}

fn parse_handle(s: &str) -> Option<isize> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => isize::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

impl TryFrom<String> for CaptureTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CaptureTarget> for String {
    fn from(target: CaptureTarget) -> Self {
        target.to_string()
    }
}

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Desired time between capture attempts, in milliseconds.
    pub target_interval_ms: u32,

    /// What to capture.
    pub capture_target: CaptureTarget,
}

impl CaptureConfig {
    /// Create a configuration for the given target with the default interval.
    pub fn for_target(capture_target: CaptureTarget) -> Self {
        Self {
            capture_target,
            ..Self::default()
        }
    }

    /// Check that the configuration can drive a capture loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// The target interval as a duration.
    pub fn target_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.target_interval_ms))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_interval_ms: DEFAULT_TARGET_INTERVAL_MS,
            capture_target: CaptureTarget::Desktop,
        }
    }
}

/// A capturable source as presented to a picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Target to pass back to the engine.
    pub target: CaptureTarget,

    /// Display name (window title, or "Desktop").
    pub name: String,

    /// Kind of source.
    pub kind: SourceKind,

    /// Owning process, when known.
    pub process_id: Option<u32>,

    /// Width in pixels at enumeration time.
    pub width: u32,

    /// Height in pixels at enumeration time.
    pub height: u32,
}

/// Kind of capture source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    /// The whole desktop.
    Desktop,

    /// An application window.
    Window,
}

/// Capture loop statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetrics {
    /// Measured delivered frames per second since the last report.
    pub fps: f32,

    /// Target frames per second derived from the interval.
    pub target_fps: f32,

    /// Frames handed to the sink.
    pub frames_delivered: u64,

    /// Capture attempts that produced no frame.
    pub empty_attempts: u64,

    /// Frames dropped because the delivery queue was full.
    pub sink_drops: u64,

    /// Width of the most recent frame.
    pub last_width: u32,

    /// Height of the most recent frame.
    pub last_height: u32,

    /// Loop uptime in seconds.
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse_and_display() {
        assert_eq!("desktop".parse::<CaptureTarget>(), Ok(CaptureTarget::Desktop));
        assert_eq!(
            "window:1234".parse::<CaptureTarget>(),
            Ok(CaptureTarget::Window(1234))
        );
        assert_eq!(
            "window:0x1F".parse::<CaptureTarget>(),
            Ok(CaptureTarget::Window(31))
        );
        assert_eq!(CaptureTarget::Window(42).to_string(), "window:42");
        assert_eq!(CaptureTarget::Desktop.to_string(), "desktop");
    }

    #[test]
    fn test_target_parse_rejects_garbage() {
        assert!(matches!(
            "monitor:1".parse::<CaptureTarget>(),
            Err(ConfigError::InvalidTarget(_))
        ));
        assert!("window:".parse::<CaptureTarget>().is_err());
        assert!("window:abc".parse::<CaptureTarget>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.target_interval_ms, 16);
        assert_eq!(config.capture_target, CaptureTarget::Desktop);
        assert_eq!(config.target_interval(), Duration::from_millis(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let config = CaptureConfig {
            target_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn test_config_json_fills_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{ "capture_target": "window:77" }"#).unwrap();
        assert_eq!(config.capture_target, CaptureTarget::Window(77));
        assert_eq!(config.target_interval_ms, DEFAULT_TARGET_INTERVAL_MS);

        let json = serde_json::to_string(&CaptureConfig::default()).unwrap();
        assert!(json.contains("\"desktop\""));
    }
}
