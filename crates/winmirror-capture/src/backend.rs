//! Windowing-system seam for the frame source.

use winmirror_ipc::{CaptureTarget, SourceInfo};

use crate::region::WindowRegion;
use crate::CaptureResult;

/// Access to the windowing system a frame source captures from.
///
/// Implementations are cheap handles (`Clone`) so a controller can move one
/// onto each worker thread it starts.
pub trait WindowSystem: Clone + Send + 'static {
    /// Surfaces acquired for one target at one size.
    type Surfaces: SurfaceSet;

    /// Current region of `target`, or `None` if it no longer exists.
    fn query_region(&self, target: CaptureTarget) -> Option<WindowRegion>;

    /// Acquire the source surface, off-screen surface, bitmap and backing
    /// buffer for `target` at the extent of `region`.
    fn acquire(&self, target: CaptureTarget, region: &WindowRegion)
        -> CaptureResult<Self::Surfaces>;

    /// List capturable sources, desktop first.
    fn enumerate_sources(&self) -> CaptureResult<Vec<SourceInfo>>;
}

/// The owned bundle of drawing surfaces and pixel memory for one target.
///
/// `release` must be idempotent, and `Drop` implementations call it.
pub trait SurfaceSet {
    /// Width of the backing buffer in pixels.
    fn width(&self) -> u32;

    /// Height of the backing buffer in pixels.
    fn height(&self) -> u32;

    /// Block-copy the source surface into the backing buffer and pass the
    /// pixels to `read` while the bitmap is still bound.
    ///
    /// The previously bound object is restored before returning, on success
    /// and on failure.
    fn blit_with<R>(&mut self, read: impl FnOnce(&[u8]) -> R) -> CaptureResult<R>;

    /// Release every handle and the backing buffer.
    fn release(&mut self);

    /// Returns true once `release` has run.
    fn is_released(&self) -> bool;
}
