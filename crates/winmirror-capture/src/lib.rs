//! Frame source for window and desktop capture.
//!
//! A [`FrameSource`] owns the drawing surfaces and pixel buffer for one
//! capture target and produces BGR32 [`Frame`]s on demand. The windowing
//! system sits behind [`WindowSystem`]: GDI on Windows, and an in-process
//! [`SyntheticDisplay`] everywhere for tests and dry runs.

mod backend;
mod error;
mod frame;
mod region;
mod source;
pub mod synthetic;

#[cfg(windows)]
pub mod gdi;

pub use backend::{SurfaceSet, WindowSystem};
pub use error::CaptureError;
pub use frame::{CaptureTimestamp, Frame, PixelFormat};
pub use region::WindowRegion;
pub use source::{CaptureStats, FrameSource};
pub use synthetic::SyntheticDisplay;

#[cfg(windows)]
pub use gdi::{enumerate_windows, GdiWindowSystem};

/// Window system used by hosts on this platform.
#[cfg(windows)]
pub type PlatformWindowSystem = gdi::GdiWindowSystem;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
