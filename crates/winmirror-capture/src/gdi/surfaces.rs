//! GDI surfaces and DIB-section backing buffer.

use std::ffi::c_void;

use tracing::{debug, instrument, trace};
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GdiFlush, GetDC,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
    SRCCOPY,
};

use winmirror_ipc::CaptureTarget;

use super::window::target_hwnd;
use crate::backend::SurfaceSet;
use crate::error::CaptureError;
use crate::frame::PixelFormat;
use crate::region::WindowRegion;
use crate::CaptureResult;

/// Source DC, memory DC, DIB section and its pixel memory for one target.
///
/// The DIB section owns the pixel memory; deleting it frees the buffer.
pub struct GdiSurfaces {
    hwnd: HWND,
    source_dc: HDC,
    memory_dc: HDC,
    bitmap: HBITMAP,
    bits: *mut c_void,
    width: u32,
    height: u32,
    released: bool,
}

impl GdiSurfaces {
    /// Acquire all surfaces for `target` at the size of `region`.
    #[instrument(name = "gdi_acquire", skip(region), fields(width = region.width(), height = region.height()))]
    pub fn acquire(target: CaptureTarget, region: &WindowRegion) -> CaptureResult<Self> {
        let (width, height) = region.dimensions().ok_or_else(|| {
            CaptureError::acquisition(format!(
                "cannot create a {}x{} bitmap",
                region.width(),
                region.height()
            ))
        })?;

        // Partially built sets are torn down by Drop on every early return.
        let mut surfaces = Self {
            hwnd: target_hwnd(target),
            source_dc: HDC::default(),
            memory_dc: HDC::default(),
            bitmap: HBITMAP::default(),
            bits: std::ptr::null_mut(),
            width,
            height,
            released: false,
        };

        unsafe {
            surfaces.source_dc = GetDC(surfaces.hwnd);
            if surfaces.source_dc.is_invalid() {
                return Err(CaptureError::acquisition("GetDC failed for capture target"));
            }

            surfaces.memory_dc = CreateCompatibleDC(surfaces.source_dc);
            if surfaces.memory_dc.is_invalid() {
                return Err(CaptureError::acquisition("CreateCompatibleDC failed"));
            }

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width as i32,
                    // Negative height selects a top-down DIB.
                    biHeight: -(height as i32),
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut bits: *mut c_void = std::ptr::null_mut();
            surfaces.bitmap = CreateDIBSection(
                surfaces.memory_dc,
                &bmi,
                DIB_RGB_COLORS,
                &mut bits,
                HANDLE::default(),
                0,
            )
            .map_err(|e| CaptureError::ResourceAcquisition {
                message: "CreateDIBSection failed".to_string(),
                source: Some(e),
            })?;

            if bits.is_null() {
                return Err(CaptureError::acquisition("DIB section has no pixel memory"));
            }
            surfaces.bits = bits;
        }

        debug!(width, height, "Acquired GDI surfaces");
        Ok(surfaces)
    }

    fn buffer_len(&self) -> usize {
        PixelFormat::Bgr32.buffer_size(self.width, self.height)
    }
}

impl SurfaceSet for GdiSurfaces {
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

        unsafe {
            let previous = SelectObject(self.memory_dc, self.bitmap);

            let copied = BitBlt(
                self.memory_dc,
                0,
                0,
                self.width as i32,
                self.height as i32,
                self.source_dc,
                0,
                0,
                SRCCOPY,
            );

            if let Err(e) = copied {
                SelectObject(self.memory_dc, previous);
                return Err(CaptureError::CopyFailed(e.message().to_string()));
            }

            // Drain the GDI batch before reading DIB memory directly.
            let _ = GdiFlush();

            let pixels = std::slice::from_raw_parts(self.bits as *const u8, self.buffer_len());
            let result = read(pixels);

            SelectObject(self.memory_dc, previous);
            trace!("Block copy complete");
            Ok(result)
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        unsafe {
            if !self.bitmap.is_invalid() {
                let _ = DeleteObject(self.bitmap);
                self.bitmap = HBITMAP::default();
                self.bits = std::ptr::null_mut();
            }
            if !self.memory_dc.is_invalid() {
                let _ = DeleteDC(self.memory_dc);
                self.memory_dc = HDC::default();
            }
            if !self.source_dc.is_invalid() {
                ReleaseDC(self.hwnd, self.source_dc);
                self.source_dc = HDC::default();
            }
        }

        trace!("Released GDI surfaces");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for GdiSurfaces {
    fn drop(&mut self) {
        self.release();
    }
}
