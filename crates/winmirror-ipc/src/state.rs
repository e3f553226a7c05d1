//! Capture loop state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle of one capture loop.
///
/// `Created → Running → Cancelling → Stopped`. A loop may also go straight
/// from `Created` to `Stopped` when it is cancelled before its first
/// iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Loop constructed, worker not yet iterating.
    #[default]
    Created,

    /// Capturing and delivering frames.
    Running,

    /// Cancellation observed; finishing the in-flight segment and releasing
    /// resources.
    Cancelling,

    /// Resources released, worker finished.
    Stopped,
}

impl LoopState {
    /// Returns true once resources are released.
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: LoopState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Created, Self::Cancelling)
                | (Self::Created, Self::Stopped)
                | (Self::Running, Self::Cancelling)
                | (Self::Cancelling, Self::Stopped)
        )
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Cancelling => "Cancelling",
            Self::Stopped => "Stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(LoopState::Created.can_transition_to(LoopState::Running));
        assert!(LoopState::Running.can_transition_to(LoopState::Cancelling));
        assert!(LoopState::Cancelling.can_transition_to(LoopState::Stopped));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!LoopState::Stopped.can_transition_to(LoopState::Running));
        assert!(!LoopState::Cancelling.can_transition_to(LoopState::Running));
        assert!(!LoopState::Running.can_transition_to(LoopState::Stopped));
    }
}
