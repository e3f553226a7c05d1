//! Error types for the capture module.

use thiserror::Error;
use winmirror_ipc::CaptureTarget;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The windowing system refused to create a surface or buffer.
    #[error("Failed to acquire capture resources: {message}")]
    ResourceAcquisition {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// The target window no longer exists.
    #[error("Capture target is not a valid window: {0}")]
    InvalidTarget(CaptureTarget),

    /// The target currently has no visible area.
    #[error("Capture region is degenerate: {width}x{height}")]
    DegenerateRegion { width: i32, height: i32 },

    /// The block copy into the off-screen surface failed.
    #[error("Block copy failed: {0}")]
    CopyFailed(String),

    /// The frame source has been closed.
    #[error("Frame source is closed")]
    Released,
}

impl CaptureError {
    /// Build a resource acquisition error without an OS source.
    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::ResourceAcquisition {
            message: message.into(),
            #[cfg(windows)]
            source: None,
        }
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for CaptureError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use windows::core::HRESULT;

    #[test]
    fn test_windows_error_keeps_source() {
        let os_error = windows::core::Error::from(HRESULT(0x8000_4005_u32 as i32));
        let err = CaptureError::from(os_error);
        match err {
            CaptureError::WindowsApi { source, .. } => assert!(source.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
