use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::oneshot;

use crate::error::{panic_message, ActorError};
use crate::runtime::RuntimeConfig;

// ============================================================================
// Scheduler Boundary
// ============================================================================
//
// The runtime needs exactly two things from its host: start a unit of work
// and join it. Each actor loop occupies one unit for its whole lifetime and
// blocks inside it, so units must tolerate blocking.
//
// ============================================================================

/// A unit of work handed to a scheduler
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Host that runs one execution unit per actor
pub trait Scheduler: Send + Sync + 'static {
    /// Starts `work` on a new execution unit named after `actor`
    fn start(&self, actor: &str, work: Work) -> Result<Box<dyn Completion>, ActorError>;
}

/// Handle to a started execution unit
pub trait Completion: Send {
    /// Blocks until the unit finished. Must not be called from an async task.
    fn join(self: Box<Self>) -> Result<(), ActorError>;
}

// ============================================================================
// Thread-per-actor scheduler
// ============================================================================

/// Runs each actor on a dedicated, named OS thread
#[derive(Clone, Debug, Default)]
pub struct ThreadScheduler {
    config: RuntimeConfig,
}

impl ThreadScheduler {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }
}

struct ThreadCompletion {
    actor: String,
    handle: thread::JoinHandle<()>,
}

impl Scheduler for ThreadScheduler {
    fn start(&self, actor: &str, work: Work) -> Result<Box<dyn Completion>, ActorError> {
        let mut builder = thread::Builder::new().name(self.config.thread_name(actor));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder.spawn(work).map_err(|source| ActorError::Scheduler {
            actor: actor.to_string(),
            source,
        })?;
        tracing::trace!(actor = %actor, "Actor thread spawned");

        Ok(Box::new(ThreadCompletion {
            actor: actor.to_string(),
            handle,
        }))
    }
}

impl Completion for ThreadCompletion {
    fn join(self: Box<Self>) -> Result<(), ActorError> {
        let ThreadCompletion { actor, handle } = *self;
        handle.join().map_err(|payload| ActorError::Join {
            actor,
            message: panic_message(payload.as_ref()),
        })
    }
}

// ============================================================================
// Tokio blocking-pool scheduler
// ============================================================================

/// Runs each actor on a tokio runtime's blocking thread pool
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running in, if any
    pub fn current() -> Result<Self, ActorError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| ActorError::illegal(format!("no tokio runtime available: {e}")))
    }
}

struct TokioCompletion {
    actor: String,
    finished: oneshot::Receiver<Result<(), String>>,
}

impl Scheduler for TokioScheduler {
    fn start(&self, actor: &str, work: Work) -> Result<Box<dyn Completion>, ActorError> {
        let (done, finished) = oneshot::channel();
        self.handle.spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work))
                .map_err(|payload| panic_message(payload.as_ref()));
            let _ = done.send(outcome);
        });
        tracing::trace!(actor = %actor, "Actor scheduled on blocking pool");

        Ok(Box::new(TokioCompletion {
            actor: actor.to_string(),
            finished,
        }))
    }
}

impl Completion for TokioCompletion {
    fn join(self: Box<Self>) -> Result<(), ActorError> {
        match self.finished.blocking_recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(ActorError::Join {
                actor: self.actor,
                message,
            }),
            Err(_) => Err(ActorError::Join {
                actor: self.actor,
                message: "runtime dropped the execution unit".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_thread_scheduler_names_thread() {
        let scheduler = ThreadScheduler::new(RuntimeConfig::new().thread_name_prefix("test-"));
        let seen = Arc::new(std::sync::Mutex::new(None));
        let slot = seen.clone();

        let unit = scheduler
            .start(
                "worker",
                Box::new(move || {
                    *slot.lock().unwrap() = thread::current().name().map(str::to_string);
                }),
            )
            .unwrap();
        unit.join().unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("test-worker"));
    }

    #[test]
    fn test_thread_scheduler_reports_panics_on_join() {
        let scheduler = ThreadScheduler::default();
        let unit = scheduler
            .start("doomed", Box::new(|| {
                panic!("escaped");
            }))
            .unwrap();

        match unit.join() {
            Err(ActorError::Join { actor, message }) => {
                assert_eq!(actor, "doomed");
                assert_eq!(message, "escaped");
            }
            other => panic!("unexpected join result: {other:?}"),
        }
    }

    #[test]
    fn test_tokio_scheduler_runs_work() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let scheduler = TokioScheduler::new(runtime.handle().clone());

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let unit = scheduler
            .start("blocking", Box::new(move || flag.store(true, Ordering::SeqCst)))
            .unwrap();
        unit.join().unwrap();

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tokio_scheduler_requires_runtime() {
        assert!(TokioScheduler::current().unwrap_err().is_illegal_state());
    }
}
