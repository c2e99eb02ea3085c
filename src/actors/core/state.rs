use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// Actor Lifecycle State
// ============================================================================
//
// CREATED -> RUNNING -> SHUTDOWN, forward only. Every transition is a
// compare-and-set so that exactly one caller wins each step.
//
// ============================================================================

/// Lifecycle state of an actor handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActorState {
    /// Configurable, not yet started
    Created = 0,
    /// Execution loop is live
    Running = 1,
    /// Terminal; the handle is inert
    Shutdown = 2,
}

impl ActorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ActorState::Created,
            1 => ActorState::Running,
            _ => ActorState::Shutdown,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ActorState::Created)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ActorState::Running)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, ActorState::Shutdown)
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorState::Created => write!(f, "CREATED"),
            ActorState::Running => write!(f, "RUNNING"),
            ActorState::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Atomic cell holding an [`ActorState`]
pub(crate) struct AtomicActorState(AtomicU8);

impl AtomicActorState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ActorState::Created as u8))
    }

    pub(crate) fn load(&self) -> ActorState {
        ActorState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`; returns false if the current state is not `from`.
    pub(crate) fn transition(&self, from: ActorState, to: ActorState) -> bool {
        debug_assert!((from as u8) < (to as u8), "actor state only moves forward");
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_forward_only() {
        let state = AtomicActorState::new();
        assert_eq!(state.load(), ActorState::Created);

        assert!(state.transition(ActorState::Created, ActorState::Running));
        assert!(!state.transition(ActorState::Created, ActorState::Running));
        assert_eq!(state.load(), ActorState::Running);

        assert!(state.transition(ActorState::Running, ActorState::Shutdown));
        assert!(state.load().is_shutdown());
    }

    #[test]
    fn test_only_one_start_wins() {
        let state = std::sync::Arc::new(AtomicActorState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.transition(ActorState::Created, ActorState::Running))
            })
            .collect();
        let winners: usize = handles.into_iter().map(|h| h.join().unwrap() as usize).sum();
        assert_eq!(winners, 1);
    }
}
