use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use crate::error::ActorError;

// ============================================================================
// Uncaught Panic Reporting
// ============================================================================
//
// Every actor panic is reported here before supervision runs. The reporter
// is process-wide and can be replaced at most once; it only observes.
//
// ============================================================================

/// Receives the failing actor's name and the cause
pub type PanicReporter = Box<dyn Fn(&str, &anyhow::Error) + Send + Sync>;

static REPORTER: OnceLock<PanicReporter> = OnceLock::new();

/// Installs the process-wide panic reporter. Fails if one is already set.
pub fn set_panic_reporter<F>(reporter: F) -> Result<(), ActorError>
where
    F: Fn(&str, &anyhow::Error) + Send + Sync + 'static,
{
    REPORTER
        .set(Box::new(reporter))
        .map_err(|_| ActorError::illegal("panic reporter already set"))
}

pub(crate) fn report(actor: &str, cause: &anyhow::Error) {
    let Some(reporter) = REPORTER.get() else {
        default_report(actor, cause);
        return;
    };

    if panic::catch_unwind(AssertUnwindSafe(|| reporter(actor, cause))).is_err() {
        tracing::warn!(actor = %actor, "Panic reporter itself panicked");
        default_report(actor, cause);
    }
}

fn default_report(actor: &str, cause: &anyhow::Error) {
    tracing::error!(actor = %actor, error = ?cause, "Actor panicked");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_reporter_settable_once() {
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();

        // Other tests in this process may already have installed one.
        let installed = set_panic_reporter(move |actor, cause| {
            counter.fetch_add(1, Ordering::SeqCst);
            default_report(actor, cause);
        })
        .is_ok();

        let second = set_panic_reporter(|_, _| {});
        assert!(second.unwrap_err().is_illegal_state());

        report("reporter-test", &anyhow::anyhow!("boom"));
        if installed {
            assert!(reported.load(Ordering::SeqCst) >= 1);
        }
    }
}
