//! Window enumeration and region queries.

use tracing::{debug, instrument};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetDesktopWindow, GetWindowRect, GetWindowTextLengthW,
    GetWindowTextW, GetWindowThreadProcessId, IsWindow, IsWindowVisible,
};

use winmirror_ipc::{CaptureTarget, SourceInfo, SourceKind};

use crate::region::WindowRegion;
use crate::CaptureResult;

/// Window information for capture.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    /// Window handle.
    pub handle: isize,

    /// Window title.
    pub title: String,

    /// Process ID.
    pub process_id: u32,

    /// Client area dimensions.
    pub width: u32,
    pub height: u32,
}

impl WindowInfo {
    /// Convert to a source descriptor for a picker.
    pub fn to_source_info(&self) -> SourceInfo {
        SourceInfo {
            target: CaptureTarget::Window(self.handle),
            name: self.title.clone(),
            kind: SourceKind::Window,
            process_id: Some(self.process_id),
            width: self.width,
            height: self.height,
        }
    }
}

/// Resolve a target to the window whose DC is the capture source.
pub(crate) fn target_hwnd(target: CaptureTarget) -> HWND {
    match target {
        CaptureTarget::Desktop => unsafe { GetDesktopWindow() },
        CaptureTarget::Window(handle) => HWND(handle as *mut _),
    }
}

/// Current screen-space region of a target's client area.
///
/// Returns `None` if the window has been destroyed. A minimized window
/// reports an empty client rectangle.
pub(crate) fn query_region(target: CaptureTarget) -> Option<WindowRegion> {
    let hwnd = target_hwnd(target);

    unsafe {
        if !IsWindow(hwnd).as_bool() {
            return None;
        }

        if target.is_desktop() {
            let mut rect = RECT::default();
            GetWindowRect(hwnd, &mut rect).ok()?;
            return Some(WindowRegion::new(rect.left, rect.top, rect.right, rect.bottom));
        }

        let mut client = RECT::default();
        GetClientRect(hwnd, &mut client).ok()?;

        let mut origin = POINT { x: 0, y: 0 };
        if !ClientToScreen(hwnd, &mut origin).as_bool() {
            return None;
        }

        Some(WindowRegion::with_size(
            origin.x,
            origin.y,
            client.right - client.left,
            client.bottom - client.top,
        ))
    }
}

/// Enumerate all visible, titled top-level windows.
#[instrument(name = "enumerate_windows")]
pub fn enumerate_windows() -> CaptureResult<Vec<WindowInfo>> {
    let mut windows: Vec<WindowInfo> = Vec::new();

    unsafe {
        EnumWindows(
            Some(enum_window_callback),
            LPARAM(&mut windows as *mut Vec<WindowInfo> as isize),
        )?;
    }

    debug!(count = windows.len(), "Enumerated windows");
    Ok(windows)
}

unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<WindowInfo>);

    if !IsWindowVisible(hwnd).as_bool() {
        return BOOL::from(true);
    }

    let title_length = GetWindowTextLengthW(hwnd);
    if title_length == 0 {
        return BOOL::from(true);
    }

    let mut title_buffer: Vec<u16> = vec![0; (title_length + 1) as usize];
    let actual_length = GetWindowTextW(hwnd, &mut title_buffer);
    if actual_length == 0 {
        return BOOL::from(true);
    }

    let title = String::from_utf16_lossy(&title_buffer[..actual_length as usize]);
    if title.trim().is_empty() {
        return BOOL::from(true);
    }

    let mut rect = RECT::default();
    if GetClientRect(hwnd, &mut rect).is_err() {
        return BOOL::from(true);
    }

    let mut process_id: u32 = 0;
    GetWindowThreadProcessId(hwnd, Some(&mut process_id));

    windows.push(WindowInfo {
        handle: hwnd.0 as isize,
        title,
        process_id,
        width: (rect.right - rect.left).max(0) as u32,
        height: (rect.bottom - rect.top).max(0) as u32,
    });

    BOOL::from(true)
}
