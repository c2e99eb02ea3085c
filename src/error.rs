//! Error types for the actor runtime.

use thiserror::Error;

/// Errors surfaced synchronously by the actor API.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The API was misused: wrong owner, wrong lifecycle state, wrong
    /// context view, or an incompatible behavior type.
    #[error("Illegal actor state: {0}")]
    IllegalActorState(String),

    /// The runner's startup callback failed.
    #[error("Startup callback failed: {0}")]
    Startup(#[source] anyhow::Error),

    /// The scheduler could not start an execution unit for an actor.
    #[error("Failed to start execution unit for actor {actor}: {source}")]
    Scheduler {
        actor: String,
        #[source]
        source: std::io::Error,
    },

    /// A synchronous signal was discarded by a target that did not shut down.
    #[error("Signal to actor {actor} was dropped before the actor shut down")]
    SignalLost { actor: String },

    /// An execution unit terminated abnormally outside of supervision.
    #[error("Execution unit for actor {actor} terminated abnormally: {message}")]
    Join { actor: String, message: String },
}

impl ActorError {
    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        ActorError::IllegalActorState(message.into())
    }

    /// Whether this error reports API misuse.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, ActorError::IllegalActorState(_))
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_from_str() {
        let payload = std::panic::catch_unwind(|| panic!("boom-str")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom-str");
    }

    #[test]
    fn test_panic_message_from_string() {
        let payload =
            std::panic::catch_unwind(|| panic!("{}", String::from("boom-string"))).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom-string");
    }

    #[test]
    fn test_illegal_state_display() {
        let err = ActorError::illegal("behavior already set");
        assert!(err.is_illegal_state());
        assert_eq!(err.to_string(), "Illegal actor state: behavior already set");
    }
}
