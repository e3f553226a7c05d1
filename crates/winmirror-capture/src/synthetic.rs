//! In-process display used for tests and dry runs.
//!
//! `SyntheticDisplay` behaves like a windowing system with a desktop and a set
//! of windows whose regions can be changed at any time. Copies render a
//! deterministic pattern, failures can be injected, and every acquired surface
//! set is counted so leaks show up as a non-zero [`SyntheticDisplay::live_surfaces`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;
use winmirror_ipc::{CaptureTarget, SourceInfo, SourceKind};

use crate::backend::{SurfaceSet, WindowSystem};
use crate::error::CaptureError;
use crate::frame::PixelFormat;
use crate::region::WindowRegion;
use crate::CaptureResult;

const FIRST_HANDLE: isize = 0x1000;

#[derive(Debug, Clone)]
struct SyntheticWindow {
    title: String,
    region: WindowRegion,
    process_id: u32,
}

#[derive(Debug, Default)]
struct DisplayState {
    desktop: WindowRegion,
    windows: BTreeMap<isize, SyntheticWindow>,
    next_handle: isize,
    live_surfaces: usize,
    peak_live_surfaces: usize,
    acquired_total: u64,
    released_total: u64,
    blits: u64,
    pending_copy_failures: u32,
    refuse_acquire: bool,
    copy_delay: Duration,
}

/// A simulated windowing system.
#[derive(Debug, Clone)]
pub struct SyntheticDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl SyntheticDisplay {
    /// Create a display whose desktop is `width` x `height`.
    pub fn new(width: i32, height: i32) -> Self {
        let state = DisplayState {
            desktop: WindowRegion::with_size(0, 0, width, height),
            next_handle: FIRST_HANDLE,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add a window at the top-left of the desktop and return its target.
    pub fn add_window(&self, title: &str, width: i32, height: i32) -> CaptureTarget {
        let mut state = self.state.lock();
        let handle = state.next_handle;
        state.next_handle += 0x10;
        let process_id = 1000 + state.windows.len() as u32;
        state.windows.insert(
            handle,
            SyntheticWindow {
                title: title.to_string(),
                region: WindowRegion::with_size(0, 0, width, height),
                process_id,
            },
        );
        CaptureTarget::Window(handle)
    }

    /// Change the size of a target, keeping its top-left corner.
    pub fn resize(&self, target: CaptureTarget, width: i32, height: i32) {
        self.update_region(target, |r| WindowRegion::with_size(r.left, r.top, width, height));
    }

    /// Move a target without changing its size.
    pub fn move_to(&self, target: CaptureTarget, left: i32, top: i32) {
        self.update_region(target, |r| {
            WindowRegion::with_size(left, top, r.width(), r.height())
        });
    }

    /// Replace the region of a target.
    pub fn set_region(&self, target: CaptureTarget, region: WindowRegion) {
        self.update_region(target, |_| region);
    }

    fn update_region(&self, target: CaptureTarget, f: impl FnOnce(WindowRegion) -> WindowRegion) {
        let mut state = self.state.lock();
        match target {
            CaptureTarget::Desktop => state.desktop = f(state.desktop),
            CaptureTarget::Window(handle) => {
                if let Some(window) = state.windows.get_mut(&handle) {
                    window.region = f(window.region);
                }
            }
        }
    }

    /// Destroy a window. Surfaces already acquired for it stay counted until
    /// released.
    pub fn destroy(&self, target: CaptureTarget) {
        if let CaptureTarget::Window(handle) = target {
            self.state.lock().windows.remove(&handle);
        }
    }

    /// Make the next `count` block copies fail.
    pub fn fail_next_copies(&self, count: u32) {
        self.state.lock().pending_copy_failures = count;
    }

    /// Refuse (or allow again) surface acquisition.
    pub fn refuse_acquire(&self, refuse: bool) {
        self.state.lock().refuse_acquire = refuse;
    }

    /// Make every block copy take at least `delay`.
    pub fn set_copy_delay(&self, delay: Duration) {
        self.state.lock().copy_delay = delay;
    }

    /// Surface sets acquired and not yet released.
    pub fn live_surfaces(&self) -> usize {
        self.state.lock().live_surfaces
    }

    /// Highest number of surface sets ever held at the same time.
    pub fn peak_live_surfaces(&self) -> usize {
        self.state.lock().peak_live_surfaces
    }

    /// Surface sets acquired since creation.
    pub fn acquired_total(&self) -> u64 {
        self.state.lock().acquired_total
    }

    /// Surface sets released since creation.
    pub fn released_total(&self) -> u64 {
        self.state.lock().released_total
    }

    /// Block copies performed, successful or not.
    pub fn blit_count(&self) -> u64 {
        self.state.lock().blits
    }
}

impl WindowSystem for SyntheticDisplay {
    type Surfaces = SyntheticSurfaces;

    fn query_region(&self, target: CaptureTarget) -> Option<WindowRegion> {
        let state = self.state.lock();
        match target {
            CaptureTarget::Desktop => Some(state.desktop),
            CaptureTarget::Window(handle) => state.windows.get(&handle).map(|w| w.region),
        }
    }

    fn acquire(
        &self,
        target: CaptureTarget,
        region: &WindowRegion,
    ) -> CaptureResult<SyntheticSurfaces> {
        let (width, height) = region.dimensions().ok_or_else(|| {
            CaptureError::acquisition(format!(
                "cannot create a {}x{} bitmap",
                region.width(),
                region.height()
            ))
        })?;

        let mut state = self.state.lock();
        if state.refuse_acquire {
            return Err(CaptureError::acquisition("surface creation refused"));
        }
        if let CaptureTarget::Window(handle) = target {
            if !state.windows.contains_key(&handle) {
                return Err(CaptureError::acquisition(format!(
                    "capture target {target} is not a valid window"
                )));
            }
        }

        state.live_surfaces += 1;
        state.peak_live_surfaces = state.peak_live_surfaces.max(state.live_surfaces);
        state.acquired_total += 1;
        trace!(capture_target = %target, width, height, "Acquired synthetic surfaces");

        Ok(SyntheticSurfaces {
            display: self.clone(),
            target,
            width,
            height,
            buffer: vec![0; PixelFormat::Bgr32.buffer_size(width, height)],
            generation: 0,
            released: false,
        })
    }

    fn enumerate_sources(&self) -> CaptureResult<Vec<SourceInfo>> {
        let state = self.state.lock();
        let mut sources = vec![SourceInfo {
            target: CaptureTarget::Desktop,
            name: "Desktop".to_string(),
            kind: SourceKind::Desktop,
            process_id: None,
            width: state.desktop.width().max(0) as u32,
            height: state.desktop.height().max(0) as u32,
        }];

        sources.extend(state.windows.iter().map(|(handle, window)| SourceInfo {
            target: CaptureTarget::Window(*handle),
            name: window.title.clone(),
            kind: SourceKind::Window,
            process_id: Some(window.process_id),
            width: window.region.width().max(0) as u32,
            height: window.region.height().max(0) as u32,
        }));

        Ok(sources)
    }
}

/// Surfaces and backing buffer for one synthetic target.
pub struct SyntheticSurfaces {
    display: SyntheticDisplay,
    target: CaptureTarget,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    generation: u8,
    released: bool,
}

impl SyntheticSurfaces {
    /// Render the test pattern: blue = x, green = y, red = copy generation.
    fn render(&mut self) {
        let stride = PixelFormat::Bgr32.stride(self.width) as usize;
        let generation = self.generation;
        for (y, row) in self.buffer.chunks_exact_mut(stride).enumerate() {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                px[0] = x as u8;
                px[1] = y as u8;
                px[2] = generation;
                px[3] = 0;
            }
        }
    }
}

impl SurfaceSet for SyntheticSurfaces {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn blit_with<R>(&mut self, read: impl FnOnce(&[u8]) -> R) -> CaptureResult<R> {
        if self.released {
            return Err(CaptureError::Released);
        }

        let delay = {
            let mut state = self.display.state.lock();
            state.blits += 1;

            if state.pending_copy_failures > 0 {
                state.pending_copy_failures -= 1;
                return Err(CaptureError::CopyFailed("injected failure".to_string()));
            }
            if let CaptureTarget::Window(handle) = self.target {
                if !state.windows.contains_key(&handle) {
                    return Err(CaptureError::CopyFailed("source window destroyed".to_string()));
                }
            }
            state.copy_delay
        };

        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.generation = self.generation.wrapping_add(1);
        self.render();
        Ok(read(&self.buffer))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.buffer = Vec::new();

        let mut state = self.display.state.lock();
        state.live_surfaces -= 1;
        state.released_total += 1;
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for SyntheticSurfaces {
    fn drop(&mut self) {
        self.release();
    }
}
