//! Frame delivery across execution contexts.
//!
//! The capture loop never calls the consumer directly. It posts frames to a
//! bounded queue drained by a [`DeliveryContext`], a single consumer thread
//! that owns the sink and invokes it in submission order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, trace};
use winmirror_capture::Frame;

use crate::error::EngineError;

/// Queue depth between the capture loop and the consumer.
pub const FRAME_CHANNEL_CAPACITY: usize = 3;

/// Consumer of captured frames.
///
/// `deliver` runs on the delivery context and should return quickly.
pub trait FrameSink {
    fn deliver(&mut self, frame: Frame);

    /// Frames accepted by `deliver` but never handed to a consumer.
    fn dropped(&self) -> u64 {
        0
    }
}

impl<F: FnMut(Frame)> FrameSink for F {
    fn deliver(&mut self, frame: Frame) {
        self(frame)
    }
}

/// Loop-side sink that posts frames to a delivery context.
///
/// Never blocks: when the queue is full the frame is dropped and counted.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Wrap an existing sender.
    pub fn new(sender: Sender<Frame>) -> Self {
        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl FrameSink for ChannelSink {
    fn deliver(&mut self, frame: Frame) {
        let sequence = frame.sequence;
        match self.sender.try_send(frame) {
            Ok(()) => trace!(sequence, "Frame queued for delivery"),
            Err(TrySendError::Full(_)) => {
                debug!("Delivery queue full, dropping frame #{}", sequence);
                self.record_drop();
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Delivery context gone, dropping frame #{}", sequence);
                self.record_drop();
            }
        }
    }

    /// Counted across every clone of this sink.
    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A bounded frame channel whose sending side is a [`ChannelSink`].
pub fn frame_channel() -> (ChannelSink, Receiver<Frame>) {
    let (sender, receiver) = crossbeam_channel::bounded(FRAME_CHANNEL_CAPACITY);
    (ChannelSink::new(sender), receiver)
}

/// Single-threaded consumer context that owns a sink.
///
/// Dropping the context without calling [`DeliveryContext::shutdown`] lets the
/// consumer thread finish on its own once every sink clone is gone.
pub struct DeliveryContext<S: FrameSink + Send + 'static> {
    sink: ChannelSink,
    handle: JoinHandle<S>,
}

impl<S: FrameSink + Send + 'static> DeliveryContext<S> {
    /// Start the consumer thread.
    pub fn spawn(mut sink: S) -> Self {
        let (channel_sink, receiver) = frame_channel();

        let handle = thread::spawn(move || {
            debug!("Delivery context starting");
            let mut delivered: u64 = 0;
            for frame in receiver.iter() {
                sink.deliver(frame);
                delivered += 1;
            }
            debug!(delivered, "Delivery context stopped");
            sink
        });

        Self {
            sink: channel_sink,
            handle,
        }
    }

    /// A loop-side handle that posts into this context.
    pub fn sink(&self) -> ChannelSink {
        self.sink.clone()
    }

    /// Drain remaining frames, stop the consumer and return the sink.
    ///
    /// Blocks until every outstanding [`ChannelSink`] clone has been dropped.
    pub fn shutdown(self) -> Result<S, EngineError> {
        let Self { sink, handle } = self;
        drop(sink);
        handle
            .join()
            .map_err(|_| EngineError::WorkerPanicked("delivery"))
    }
}
