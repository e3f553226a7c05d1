//! Frame source: resource ownership, resize handling and frame acquisition.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, instrument, trace, warn};
use winmirror_ipc::CaptureTarget;

use crate::backend::{SurfaceSet, WindowSystem};
use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, Frame};
use crate::region::WindowRegion;
use crate::CaptureResult;

/// Counters for one frame source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Calls to `capture`.
    pub attempts: u64,

    /// Frames produced.
    pub frames: u64,

    /// Attempts that yielded no frame.
    pub failures: u64,

    /// Surface sets acquired after the initial one (resizes and retries).
    pub recreations: u64,
}

/// Owns every capture resource for one target and produces frames from it.
///
/// The target is fixed for the lifetime of the source; capturing something
/// else means closing this source and opening a new one.
pub struct FrameSource<W: WindowSystem> {
    system: W,
    target: CaptureTarget,
    region: WindowRegion,
    surfaces: Option<W::Surfaces>,
    closed: bool,
    opened_at: Instant,
    sequence: u64,
    stats: CaptureStats,
}

impl<W: WindowSystem> FrameSource<W> {
    /// Acquire capture resources for `target`.
    ///
    /// Fails with [`CaptureError::ResourceAcquisition`] if the target does not
    /// exist or the windowing system refuses to create the surfaces. A target that exists but is currently minimized
    /// opens successfully; its surfaces are acquired on the first capture
    /// that finds a visible area.
    #[instrument(name = "frame_source_open", skip_all, fields(target = %target))]
    pub fn open(system: W, target: CaptureTarget) -> CaptureResult<Self> {
        let region = system.query_region(target).ok_or_else(|| {
            CaptureError::acquisition(format!("capture target {target} is not a valid window"))
        })?;

        let surfaces = if region.is_capturable() {
            Some(system.acquire(target, &region)?)
        } else {
            debug!(
                width = region.width(),
                height = region.height(),
                "Target has no visible area, deferring surface acquisition"
            );
            None
        };

        info!(
            width = region.width(),
            height = region.height(),
            "Frame source opened"
        );

        Ok(Self {
            system,
            target,
            region,
            surfaces,
            closed: false,
            opened_at: Instant::now(),
            sequence: 0,
            stats: CaptureStats::default(),
        })
    }

    /// Perform one capture attempt.
    ///
    /// Every per-attempt failure (target gone, minimized window, failed copy,
    /// failed reacquisition, closed source) is logged and yields `None`; the
    /// next call tries again from scratch.
    pub fn capture(&mut self) -> Option<Frame> {
        self.stats.attempts += 1;

        match self.try_capture() {
            Ok(frame) => {
                self.stats.frames += 1;
                Some(frame)
            }
            Err(e) => {
                self.stats.failures += 1;
                match e {
                    CaptureError::DegenerateRegion { .. } | CaptureError::Released => {
                        trace!("No frame: {}", e)
                    }
                    _ => debug!("No frame: {}", e),
                }
                None
            }
        }
    }

    fn try_capture(&mut self) -> CaptureResult<Frame> {
        if self.closed {
            return Err(CaptureError::Released);
        }

        let region = self
            .system
            .query_region(self.target)
            .ok_or(CaptureError::InvalidTarget(self.target))?;

        // A minimized window leaves the current surfaces in place.
        let (width, height) = region.dimensions().ok_or(CaptureError::DegenerateRegion {
            width: region.width(),
            height: region.height(),
        })?;

        let stale = self.surfaces.is_none() || !self.region.same_size(&region);

        if stale {
            self.recreate(&region)?;
        }
        self.region = region;

        let surfaces = self.surfaces.as_mut().ok_or(CaptureError::Released)?;
        let data = surfaces.blit_with(Bytes::copy_from_slice)?;

        let timestamp = CaptureTimestamp::now(self.opened_at);
        let sequence = self.sequence;
        self.sequence += 1;

        trace!(sequence, width, height, "Captured frame");
        Ok(Frame::new(data, width, height, timestamp, sequence))
    }

    fn recreate(&mut self, region: &WindowRegion) -> CaptureResult<()> {
        if let Some(mut old) = self.surfaces.take() {
            debug!(
                old_width = old.width(),
                old_height = old.height(),
                new_width = region.width(),
                new_height = region.height(),
                "Target resized, recreating surfaces"
            );
            old.release();
        }

        match self.system.acquire(self.target, region) {
            Ok(surfaces) => {
                self.surfaces = Some(surfaces);
                self.stats.recreations += 1;
                Ok(())
            }
            Err(e) => {
                warn!("Surface recreation failed, retrying next attempt: {}", e);
                Err(e)
            }
        }
    }

    /// Release all capture resources. Safe to call more than once.
    #[instrument(name = "frame_source_close", skip(self), fields(target = %self.target))]
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        if let Some(mut surfaces) = self.surfaces.take() {
            surfaces.release();
        }
        self.closed = true;

        info!(
            attempts = self.stats.attempts,
            frames = self.stats.frames,
            failures = self.stats.failures,
            "Frame source closed"
        );
    }

    /// The target this source captures.
    pub fn target(&self) -> CaptureTarget {
        self.target
    }

    /// The region seen by the most recent successful query.
    pub fn region(&self) -> WindowRegion {
        self.region
    }

    /// Returns true while surfaces are held.
    pub fn has_resources(&self) -> bool {
        self.surfaces
            .as_ref()
            .is_some_and(|surfaces| !surfaces.is_released())
    }

    /// Returns true after `close`.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Counters since open.
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}

impl<W: WindowSystem> Drop for FrameSource<W> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticDisplay;

    #[test]
    fn test_open_rejects_unknown_window() {
        let display = SyntheticDisplay::new(800, 600);
        let result = FrameSource::open(display.clone(), CaptureTarget::Window(9999));
        assert!(matches!(
            result,
            Err(CaptureError::ResourceAcquisition { .. })
        ));
        assert_eq!(display.live_surfaces(), 0);
    }

    #[test]
    fn test_open_surfaces_acquisition_failure() {
        let display = SyntheticDisplay::new(800, 600);
        display.refuse_acquire(true);
        let result = FrameSource::open(display.clone(), CaptureTarget::Desktop);
        assert!(matches!(
            result,
            Err(CaptureError::ResourceAcquisition { .. })
        ));
    }

    #[test]
    fn test_capture_counts_attempts() {
        let display = SyntheticDisplay::new(64, 32);
        let mut source = FrameSource::open(display.clone(), CaptureTarget::Desktop).unwrap();

        assert!(source.capture().is_some());
        display.fail_next_copies(1);
        assert!(source.capture().is_none());
        assert!(source.capture().is_some());

        let stats = source.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.recreations, 0);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let display = SyntheticDisplay::new(8, 8);
        let mut source = FrameSource::open(display, CaptureTarget::Desktop).unwrap();

        let a = source.capture().unwrap();
        let b = source.capture().unwrap();
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert!(b.timestamp.pts_100ns >= a.timestamp.pts_100ns);
    }

    #[test]
    fn test_minimized_at_open_defers_acquisition() {
        let display = SyntheticDisplay::new(800, 600);
        let target = display.add_window("Minimized", 0, 0);

        let mut source = FrameSource::open(display.clone(), target).unwrap();
        assert!(!source.has_resources());
        assert!(source.capture().is_none());

        display.resize(target, 120, 80);
        let frame = source.capture().unwrap();
        assert_eq!((frame.width, frame.height), (120, 80));
        assert!(source.has_resources());
    }

    #[test]
    fn test_drop_releases_surfaces() {
        let display = SyntheticDisplay::new(100, 100);
        {
            let _source = FrameSource::open(display.clone(), CaptureTarget::Desktop).unwrap();
            assert_eq!(display.live_surfaces(), 1);
        }
        assert_eq!(display.live_surfaces(), 0);
    }
}
