//! GDI capture backend.
//!
//! ```text
//! GetDC(target) ── source surface
//!   │  CreateCompatibleDC
//!   ▼
//! memory DC ◄── SelectObject ── CreateDIBSection (BGR32, top-down)
//!   │  BitBlt(SRCCOPY) + GdiFlush
//!   ▼
//! DIB bits → Bytes → Frame
//! ```

mod surfaces;
mod window;

pub use surfaces::GdiSurfaces;
pub use window::{enumerate_windows, WindowInfo};

use winmirror_ipc::{CaptureTarget, SourceInfo, SourceKind};

use crate::backend::WindowSystem;
use crate::region::WindowRegion;
use crate::CaptureResult;

/// The Windows desktop, captured through GDI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdiWindowSystem;

impl GdiWindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSystem for GdiWindowSystem {
    type Surfaces = GdiSurfaces;

    fn query_region(&self, target: CaptureTarget) -> Option<WindowRegion> {
        window::query_region(target)
    }

    fn acquire(&self, target: CaptureTarget, region: &WindowRegion) -> CaptureResult<GdiSurfaces> {
        GdiSurfaces::acquire(target, region)
    }

    fn enumerate_sources(&self) -> CaptureResult<Vec<SourceInfo>> {
        let desktop = window::query_region(CaptureTarget::Desktop).unwrap_or_default();
        let mut sources = vec![SourceInfo {
            target: CaptureTarget::Desktop,
            name: "Desktop".to_string(),
            kind: SourceKind::Desktop,
            process_id: None,
            width: desktop.width().max(0) as u32,
            height: desktop.height().max(0) as u32,
        }];

        sources.extend(enumerate_windows()?.iter().map(WindowInfo::to_source_info));
        Ok(sources)
    }
}
