//! Frame pacing.
//!
//! Each iteration waits out whatever is left of the target interval after
//! capture and delivery, in small increments so cancellation is noticed
//! quickly. Overruns are not carried forward: a slow iteration is followed
//! immediately by the next one, and no attempt is made to catch up on missed
//! frames, so the schedule may drift over long runs.

use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;

/// Granularity of the inter-frame wait.
pub const SLEEP_INCREMENT: Duration = Duration::from_millis(1);

/// Waits between capture iterations.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
    increment: Duration,
}

impl FramePacer {
    /// Create a pacer for the given target interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            increment: SLEEP_INCREMENT,
        }
    }

    /// Override the sleep increment.
    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment.max(Duration::from_micros(100));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the interval after `elapsed`, or `None` if it is spent.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.interval
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Sleep until `started + interval`.
    ///
    /// Returns `false` if cancellation was observed before the deadline.
    pub fn wait(&self, started: Instant, token: &CancellationToken) -> bool {
        if self.remaining(started.elapsed()).is_none() {
            return !token.is_cancelled();
        }

        let deadline = started + self.interval;
        loop {
            if token.is_cancelled() {
                return false;
            }

            let now = Instant::now();
            if now >= deadline {
                return true;
            }

            thread::sleep(self.increment.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining() {
        let pacer = FramePacer::new(Duration::from_millis(16));
        assert_eq!(
            pacer.remaining(Duration::from_millis(6)),
            Some(Duration::from_millis(10))
        );
        assert_eq!(pacer.remaining(Duration::from_millis(16)), None);
        assert_eq!(pacer.remaining(Duration::from_millis(40)), None);
    }

    #[test]
    fn test_wait_reaches_deadline() {
        let pacer = FramePacer::new(Duration::from_millis(20));
        let token = CancellationToken::new();
        let started = Instant::now();

        assert!(pacer.wait(started, &token));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_overrun_returns_immediately() {
        let pacer = FramePacer::new(Duration::from_millis(5));
        let token = CancellationToken::new();
        let started = Instant::now() - Duration::from_millis(50);

        let before = Instant::now();
        assert!(pacer.wait(started, &token));
        assert!(before.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_cancelled_wait_stops_early() {
        let pacer = FramePacer::new(Duration::from_secs(10));
        let token = CancellationToken::new();
        let canceller = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let started = Instant::now();
        assert!(!pacer.wait(started, &token));
        assert!(started.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn test_coarse_increment_does_not_overshoot() {
        let pacer =
            FramePacer::new(Duration::from_millis(12)).with_increment(Duration::from_millis(5));
        let token = CancellationToken::new();
        let started = Instant::now();

        assert!(pacer.wait(started, &token));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(12));
        assert!(elapsed < Duration::from_millis(100));
    }
}
