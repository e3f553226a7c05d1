//! Metrics collection and reporting.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use winmirror_capture::Frame;
use winmirror_ipc::CaptureMetrics;

/// Collects capture loop statistics.
#[derive(Debug)]
pub struct MetricsCollector {
    start_time: RwLock<Option<Instant>>,
    frames_delivered: AtomicU64,
    empty_attempts: AtomicU64,
    sink_drops: AtomicU64,
    last_width: AtomicU32,
    last_height: AtomicU32,
    last_report_time: RwLock<Instant>,
    last_frame_count: AtomicU64,
    target_fps: f32,
}

impl MetricsCollector {
    /// Create a collector for a loop with the given target interval.
    pub fn new(target_interval: Duration) -> Self {
        let target_fps = if target_interval.is_zero() {
            0.0
        } else {
            1.0 / target_interval.as_secs_f32()
        };

        Self {
            start_time: RwLock::new(None),
            frames_delivered: AtomicU64::new(0),
            empty_attempts: AtomicU64::new(0),
            sink_drops: AtomicU64::new(0),
            last_width: AtomicU32::new(0),
            last_height: AtomicU32::new(0),
            last_report_time: RwLock::new(Instant::now()),
            last_frame_count: AtomicU64::new(0),
            target_fps,
        }
    }

    /// Start metrics collection.
    pub fn start(&self) {
        *self.start_time.write() = Some(Instant::now());
        *self.last_report_time.write() = Instant::now();
    }

    /// Stop metrics collection.
    pub fn stop(&self) {
        *self.start_time.write() = None;
    }

    /// Record a frame handed to the sink.
    pub fn record_frame(&self, frame: &Frame) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.last_width.store(frame.width, Ordering::Relaxed);
        self.last_height.store(frame.height, Ordering::Relaxed);
    }

    /// Record a capture attempt that produced nothing.
    pub fn record_empty_attempt(&self) {
        self.empty_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how many frames the sink has dropped since the loop started.
    pub fn record_sink_drops(&self, total: u64) {
        self.sink_drops.store(total, Ordering::Relaxed);
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> CaptureMetrics {
        let now = Instant::now();

        let last_time = *self.last_report_time.read();
        let elapsed = now.duration_since(last_time);
        let current_frames = self.frames_delivered.load(Ordering::Relaxed);
        let last_frames = self.last_frame_count.load(Ordering::Relaxed);

        let fps = if elapsed.as_secs_f32() > 0.0 {
            current_frames.saturating_sub(last_frames) as f32 / elapsed.as_secs_f32()
        } else {
            0.0
        };

        let uptime_seconds = self
            .start_time
            .read()
            .map(|s| now.duration_since(s).as_secs())
            .unwrap_or(0);

        CaptureMetrics {
            fps,
            target_fps: self.target_fps,
            frames_delivered: current_frames,
            empty_attempts: self.empty_attempts.load(Ordering::Relaxed),
            sink_drops: self.sink_drops.load(Ordering::Relaxed),
            last_width: self.last_width.load(Ordering::Relaxed),
            last_height: self.last_height.load(Ordering::Relaxed),
            uptime_seconds,
        }
    }

    /// Update last report time for FPS calculation.
    pub fn mark_reported(&self) {
        *self.last_report_time.write() = Instant::now();
        self.last_frame_count.store(
            self.frames_delivered.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(Duration::from_millis(u64::from(
            winmirror_ipc::DEFAULT_TARGET_INTERVAL_MS,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use winmirror_capture::CaptureTimestamp;

    #[test]
    fn test_snapshot_counts() {
        let metrics = MetricsCollector::new(Duration::from_millis(20));
        metrics.start();

        let frame = Frame::new(
            Bytes::from(vec![0u8; 8 * 4 * 4]),
            8,
            4,
            CaptureTimestamp::now(Instant::now()),
            0,
        );
        metrics.record_frame(&frame);
        metrics.record_frame(&frame);
        metrics.record_empty_attempt();
        metrics.record_sink_drops(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_delivered, 2);
        assert_eq!(snapshot.empty_attempts, 1);
        assert_eq!(snapshot.sink_drops, 1);
        assert_eq!((snapshot.last_width, snapshot.last_height), (8, 4));
        assert!((snapshot.target_fps - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_mark_reported_resets_rate_window() {
        let metrics = MetricsCollector::default();
        metrics.start();
        metrics.mark_reported();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(metrics.snapshot().fps, 0.0);
    }
}
