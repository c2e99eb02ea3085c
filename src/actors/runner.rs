use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actors::context::StartupContext;
use crate::actors::handle::{ensure_startable, same_actor, ActorNode, AnyActorHandle};
use crate::error::ActorError;
use crate::metrics;
use crate::runtime::{Completion, RuntimeConfig, Scheduler, ThreadScheduler, Work};

// ============================================================================
// Top-level Runner
// ============================================================================
//
// Starts a static set of actors, seeds them through a startup callback and
// blocks until every execution unit started during the run has finished,
// including units of children spawned along the way.
//
// ============================================================================

/// Execution units and top-level actors belonging to one run
pub(crate) struct RunScope {
    scheduler: Arc<dyn Scheduler>,
    units: Mutex<Vec<Box<dyn Completion>>>,
    roots: Mutex<Vec<Arc<dyn ActorNode>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunScope {
    fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            units: Mutex::new(Vec::new()),
            roots: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn launch(&self, actor: &str, work: Work) -> Result<(), ActorError> {
        let unit = self.scheduler.start(actor, work)?;
        lock(&self.units).push(unit);
        Ok(())
    }

    pub(crate) fn add_root(&self, actor: Arc<dyn ActorNode>) {
        lock(&self.roots).push(actor);
    }

    /// Asks every top-level actor to shut down; children follow by cascade
    fn shutdown_roots(&self) {
        for root in lock(&self.roots).iter() {
            metrics::global().record_signal_sent("shutdown");
            root.request_shutdown();
        }
    }

    /// Joins units until none are left. Units started while joining are
    /// joined too.
    fn join_all(&self) -> Result<(), ActorError> {
        let mut first_error = None;
        loop {
            let next = lock(&self.units).pop();
            let Some(unit) = next else {
                break;
            };
            if let Err(e) = unit.join() {
                tracing::error!(error = %e, "Execution unit failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Starts actors and waits for all of them to shut down
pub struct Runner {
    scheduler: Arc<dyn Scheduler>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Thread-per-actor runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_scheduler(ThreadScheduler::new(config))
    }

    pub fn with_scheduler(scheduler: impl Scheduler) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
        }
    }

    /// Starts every handle, runs `startup` to seed them, then blocks until
    /// every actor of the run has shut down.
    ///
    /// Each handle must be CREATED, have a behavior, and have been created
    /// by the calling execution unit. If `startup` fails, the started actors are shut
    /// down and joined before the error is returned.
    ///
    /// Must not be called from inside an async task.
    pub fn run<I, F>(&self, handles: I, startup: F) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = AnyActorHandle>,
        F: FnOnce(&StartupContext) -> anyhow::Result<()>,
    {
        let handles: Vec<AnyActorHandle> = handles.into_iter().collect();
        for (i, handle) in handles.iter().enumerate() {
            ensure_startable(handle.node().as_ref())?;
            if handles[..i].iter().any(|other| same_actor(other.node(), handle.node())) {
                return Err(ActorError::illegal(format!(
                    "actor {} passed to run more than once",
                    handle.name()
                )));
            }
        }

        let scope = RunScope::new(Arc::clone(&self.scheduler));
        for handle in &handles {
            if let Err(e) = Arc::clone(handle.node()).start(&scope) {
                tracing::error!(actor = %handle.name(), error = %e, "Failed to start actor, aborting run");
                scope.shutdown_roots();
                scope.join_all()?;
                return Err(e);
            }
            scope.add_root(Arc::clone(handle.node()));
        }
        tracing::info!(actors = handles.len(), "Runner started actors");

        let seeded = {
            let ctx = StartupContext::new(Arc::clone(&scope));
            startup(&ctx)
        };

        if let Err(e) = seeded {
            tracing::error!(error = %e, "Startup callback failed, shutting down actors");
            scope.shutdown_roots();
            scope.join_all()?;
            return Err(ActorError::Startup(e));
        }

        scope.join_all()?;
        tracing::info!("All actors shut down");
        Ok(())
    }
}

/// [`Runner::run`] on a default thread-per-actor runner
pub fn run<I, F>(handles: I, startup: F) -> Result<(), ActorError>
where
    I: IntoIterator<Item = AnyActorHandle>,
    F: FnOnce(&StartupContext) -> anyhow::Result<()>,
{
    Runner::new().run(handles, startup)
}
