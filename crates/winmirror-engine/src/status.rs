//! Observable capture loop state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};
use winmirror_ipc::LoopState;

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LoopState>,
    changed: Condvar,
}

/// Shared handle to a capture loop's [`LoopState`].
///
/// The loop drives transitions; any clone can read the state or block until
/// the loop reaches `Stopped`.
#[derive(Debug, Clone, Default)]
pub struct LoopStatus {
    shared: Arc<Shared>,
}

impl LoopStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn get(&self) -> LoopState {
        *self.shared.state.lock()
    }

    /// Move to `next` if the transition is legal. Returns whether it happened.
    pub(crate) fn transition(&self, next: LoopState) -> bool {
        let mut state = self.shared.state.lock();
        let previous = *state;
        if !previous.can_transition_to(next) {
            warn!(
                previous = previous.name(),
                next = next.name(),
                "Ignoring illegal loop state transition"
            );
            return false;
        }

        *state = next;
        drop(state);
        self.shared.changed.notify_all();

        debug!(
            previous = previous.name(),
            current = next.name(),
            "Loop state transition"
        );
        true
    }

    /// Block until the loop reaches `Stopped`.
    pub fn wait_stopped(&self) {
        let mut state = self.shared.state.lock();
        while !state.is_stopped() {
            self.shared.changed.wait(&mut state);
        }
    }

    /// Block until the loop reaches `Stopped` or `timeout` elapses.
    ///
    /// Returns true if the loop stopped.
    pub fn wait_stopped_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.is_stopped() {
            if self
                .shared
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.is_stopped();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_transitions_follow_state_machine() {
        let status = LoopStatus::new();
        assert_eq!(status.get(), LoopState::Created);

        assert!(status.transition(LoopState::Running));
        assert!(!status.transition(LoopState::Running));
        assert!(!status.transition(LoopState::Stopped));
        assert!(status.transition(LoopState::Cancelling));
        assert!(status.transition(LoopState::Stopped));
        assert_eq!(status.get(), LoopState::Stopped);
    }

    #[test]
    fn test_wait_stopped_wakes_observer() {
        let status = LoopStatus::new();
        let driver = status.clone();

        let handle = thread::spawn(move || {
            driver.transition(LoopState::Running);
            thread::sleep(Duration::from_millis(10));
            driver.transition(LoopState::Cancelling);
            driver.transition(LoopState::Stopped);
        });

        assert!(status.wait_stopped_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_stopped_returns_for_stopped_loop() {
        let status = LoopStatus::new();
        status.transition(LoopState::Stopped);
        status.wait_stopped();
        assert!(status.get().is_stopped());
    }

    #[test]
    fn test_wait_times_out_while_running() {
        let status = LoopStatus::new();
        status.transition(LoopState::Running);
        assert!(!status.wait_stopped_timeout(Duration::from_millis(10)));
    }
}
