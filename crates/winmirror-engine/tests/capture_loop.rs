use std::thread;
use std::time::{Duration, Instant};

use winmirror_capture::{Frame, FrameSource, SyntheticDisplay};
use winmirror_engine::{
    CancellationToken, CaptureLoop, DeliveryContext, FrameSink, SLEEP_INCREMENT,
};
use winmirror_ipc::LoopState;

/// Records what a display surface would receive.
#[derive(Default)]
struct RecordingSink {
    frames: Vec<Delivered>,
}

#[derive(Debug, Clone, Copy)]
struct Delivered {
    width: u32,
    height: u32,
    stride: u32,
    len: usize,
    sequence: u64,
    at: Instant,
}

impl FrameSink for RecordingSink {
    fn deliver(&mut self, frame: Frame) {
        self.frames.push(Delivered {
            width: frame.width,
            height: frame.height,
            stride: frame.stride,
            len: frame.data.len(),
            sequence: frame.sequence,
            at: Instant::now(),
        });
    }
}

impl RecordingSink {
    fn mismatched(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.len != f.stride as usize * f.height as usize || f.stride != f.width * 4)
            .count()
    }
}

#[test]
fn stable_target_delivers_at_target_rate() {
    let display = SyntheticDisplay::new(1920, 1080);
    let target = display.add_window("Stable", 200, 100);
    let source = FrameSource::open(display.clone(), target).unwrap();

    let delivery = DeliveryContext::spawn(RecordingSink::default());
    let token = CancellationToken::new();
    let capture_loop = CaptureLoop::new(Duration::from_millis(16), token.clone());
    let status = capture_loop.status();

    let mut sink = delivery.sink();
    let worker = thread::spawn(move || capture_loop.run(source, &mut sink));

    thread::sleep(Duration::from_millis(500));
    token.cancel();
    worker.join().unwrap();

    let recorded = delivery.shutdown().unwrap();
    let count = recorded.frames.len();
    assert!((24..=33).contains(&count), "delivered {count} frames");
    assert_eq!(recorded.mismatched(), 0);
    assert!(recorded
        .frames
        .iter()
        .all(|f| (f.width, f.height) == (200, 100)));
    assert_eq!(status.get(), LoopState::Stopped);
    assert_eq!(display.live_surfaces(), 0);
}

#[test]
fn frames_arrive_in_capture_order() {
    let display = SyntheticDisplay::new(64, 64);
    let source = FrameSource::open(display, winmirror_ipc::CaptureTarget::Desktop).unwrap();

    let delivery = DeliveryContext::spawn(RecordingSink::default());
    let token = CancellationToken::new();
    let capture_loop = CaptureLoop::new(Duration::from_millis(2), token.clone());

    let mut sink = delivery.sink();
    let worker = thread::spawn(move || capture_loop.run(source, &mut sink));
    thread::sleep(Duration::from_millis(100));
    token.cancel();
    worker.join().unwrap();

    let recorded = delivery.shutdown().unwrap();
    assert!(!recorded.frames.is_empty());
    assert!(recorded
        .frames
        .windows(2)
        .all(|pair| pair[0].sequence < pair[1].sequence && pair[0].at <= pair[1].at));
}

#[test]
fn cancellation_stops_within_a_few_increments() {
    let display = SyntheticDisplay::new(320, 200);
    let source = FrameSource::open(display.clone(), winmirror_ipc::CaptureTarget::Desktop).unwrap();

    // A long interval keeps the loop in its wait phase when cancelled.
    let token = CancellationToken::new();
    let capture_loop = CaptureLoop::new(Duration::from_secs(5), token.clone());
    let status = capture_loop.status();
    let metrics = capture_loop.metrics();

    let worker = thread::spawn(move || {
        let mut sink = |_f: Frame| {};
        capture_loop.run(source, &mut sink);
    });

    let deadline = Instant::now() + Duration::from_secs(2);
    while metrics.frames_delivered() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(status.get(), LoopState::Running);

    let cancelled_at = Instant::now();
    token.cancel();
    // A few sleep increments of slack for scheduler jitter.
    let bound = SLEEP_INCREMENT * 20;
    assert!(status.wait_stopped_timeout(bound));
    assert!(cancelled_at.elapsed() < bound, "{:?}", cancelled_at.elapsed());
    assert_eq!(display.live_surfaces(), 0);

    worker.join().unwrap();
}

#[test]
fn resize_switches_stride_without_intermediate_frames() {
    let display = SyntheticDisplay::new(1920, 1080);
    let target = display.add_window("Resizable", 200, 100);
    let source = FrameSource::open(display.clone(), target).unwrap();

    let delivery = DeliveryContext::spawn(RecordingSink::default());
    let token = CancellationToken::new();
    let capture_loop = CaptureLoop::new(Duration::from_millis(5), token.clone());
    let metrics = capture_loop.metrics();

    let mut sink = delivery.sink();
    let worker = thread::spawn(move || capture_loop.run(source, &mut sink));

    let deadline = Instant::now() + Duration::from_secs(2);
    while metrics.frames_delivered() < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    display.resize(target, 400, 300);
    let resized_at = metrics.frames_delivered();
    while metrics.frames_delivered() < resized_at + 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    token.cancel();
    worker.join().unwrap();
    let recorded = delivery.shutdown().unwrap();

    assert_eq!(recorded.mismatched(), 0);
    assert!(recorded.frames.iter().all(|f| {
        (f.width, f.height, f.stride) == (200, 100, 800)
            || (f.width, f.height, f.stride) == (400, 300, 1600)
    }));

    let first_new = recorded
        .frames
        .iter()
        .position(|f| f.width == 400)
        .expect("a frame at the new size");
    assert_eq!(recorded.frames[first_new].stride, 1600);
    assert!(recorded.frames[first_new..].iter().all(|f| f.stride == 1600));
    assert!(recorded.frames[..first_new].iter().all(|f| f.stride == 800));

    assert_eq!(display.acquired_total(), 2);
    assert_eq!(display.live_surfaces(), 0);
}
