use std::fmt;
use std::sync::Arc;

// ============================================================================
// Signals and Unwinding
// ============================================================================
//
// A Signal is an administrative event routed to supervision, never to the
// behavior. The set is closed: shutdown or panic.
//
// Unwind is the explicit control result a message or a signal handler
// returns to abandon normal processing. The execution loop interprets it:
// Panic runs supervision, Restart re-creates the behavior.
//
// ============================================================================

/// Administrative event delivered to an actor's signal handlers
#[derive(Debug, Clone)]
pub enum Signal {
    /// Orderly shutdown was requested
    Shutdown,
    /// The actor failed with the given cause
    Panic(Arc<anyhow::Error>),
}

impl Signal {
    /// Builds a panic signal from any error cause
    pub fn panic(cause: impl Into<anyhow::Error>) -> Self {
        Signal::Panic(Arc::new(cause.into()))
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Signal::Shutdown)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Signal::Panic(_))
    }

    /// The failure cause, for panic signals
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            Signal::Shutdown => None,
            Signal::Panic(cause) => Some(cause),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Signal::Shutdown => "shutdown",
            Signal::Panic(_) => "panic",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Shutdown => write!(f, "ShutdownSignal"),
            Signal::Panic(cause) => write!(f, "PanicSignal({cause})"),
        }
    }
}

/// Proof that a restart was requested through a signal handler context
#[derive(Debug)]
pub struct RestartRequest(pub(crate) ());

/// Control result that abandons the current message or signal handler
#[derive(Debug)]
pub enum Unwind {
    /// Fail the actor with a cause; supervision receives a panic signal
    Panic(anyhow::Error),
    /// Discard the mailbox and re-create the behavior
    Restart(RestartRequest),
}

impl Unwind {
    /// Fails the actor with an arbitrary cause
    pub fn panic(cause: impl Into<anyhow::Error>) -> Self {
        Unwind::Panic(cause.into())
    }
}

impl<E> From<E> for Unwind
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Unwind::Panic(anyhow::Error::new(error))
    }
}

/// What a message or signal handler returns
pub type Handled = Result<(), Unwind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("negative input: {0}")]
    struct NegativeInput(i64);

    fn check(value: i64) -> Handled {
        if value < 0 {
            return Err(NegativeInput(value).into());
        }
        Ok(())
    }

    #[test]
    fn test_error_converts_to_panic() {
        match check(-3) {
            Err(Unwind::Panic(cause)) => assert_eq!(cause.to_string(), "negative input: -3"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check(3).is_ok());
    }

    #[test]
    fn test_signal_accessors() {
        let shutdown = Signal::Shutdown;
        assert!(shutdown.is_shutdown());
        assert!(shutdown.cause().is_none());

        let failed = Signal::panic(anyhow::anyhow!("disk full"));
        assert!(failed.is_panic());
        assert_eq!(failed.cause().map(|c| c.to_string()), Some("disk full".to_string()));
        assert_eq!(failed.to_string(), "PanicSignal(disk full)");
    }
}
