//! Consumer side of the delivery context.

use std::time::Instant;

use tracing::{info, trace};
use winmirror_capture::Frame;
use winmirror_engine::FrameSink;

/// Sink that stands in for a display surface: it checks and logs every frame
/// it receives and keeps running totals.
#[derive(Debug, Default)]
pub struct FrameLog {
    frames: u64,
    bytes: u64,
    malformed: u64,
    size: Option<(u32, u32)>,
    first_at: Option<Instant>,
    last_at: Option<Instant>,
}

impl FrameLog {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Average delivery rate between the first and last frame.
    pub fn average_fps(&self) -> f64 {
        match (self.first_at, self.last_at) {
            (Some(first), Some(last)) if self.frames > 1 => {
                let secs = last.duration_since(first).as_secs_f64();
                if secs > 0.0 {
                    (self.frames - 1) as f64 / secs
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

impl FrameSink for FrameLog {
    fn deliver(&mut self, frame: Frame) {
        let now = Instant::now();
        self.first_at.get_or_insert(now);
        self.last_at = Some(now);
        self.frames += 1;
        self.bytes += frame.data.len() as u64;

        if !frame.is_valid() {
            self.malformed += 1;
        }

        let size = (frame.width, frame.height);
        if self.size != Some(size) {
            info!(
                width = frame.width,
                height = frame.height,
                stride = frame.stride,
                "Receiving frames"
            );
            self.size = Some(size);
        }

        trace!(
            sequence = frame.sequence,
            pts_ms = frame.timestamp.pts_ms(),
            "Frame delivered"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winmirror_capture::{FrameSource, SyntheticDisplay};
    use winmirror_ipc::CaptureTarget;

    #[test]
    fn test_counts_frames_and_bytes() {
        let display = SyntheticDisplay::new(8, 4);
        let mut source = FrameSource::open(display, CaptureTarget::Desktop).unwrap();
        let mut log = FrameLog::default();

        for _ in 0..3 {
            log.deliver(source.capture().unwrap());
        }

        assert_eq!(log.frames(), 3);
        assert_eq!(log.malformed(), 0);
        assert_eq!(log.bytes, 3 * 8 * 4 * 4);
        assert_eq!(log.size, Some((8, 4)));
    }

    #[test]
    fn test_fps_needs_two_frames() {
        let log = FrameLog::default();
        assert_eq!(log.average_fps(), 0.0);
    }
}
