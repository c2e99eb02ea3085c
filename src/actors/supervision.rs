use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actors::context::SignalContext;
use crate::actors::core::{Handled, Signal, Unwind};
use crate::actors::handle::ActorNode;
use crate::error::panic_message;
use crate::metrics;

// ============================================================================
// Supervision
// ============================================================================
//
// Signal handlers live in a per-actor log keyed by a strictly increasing
// registration index. Removal leaves no slot behind and keys are never
// reused, so iteration is always in registration order.
//
// Spawn cascade:
//   parent P spawns child C
//   ├── on P: any signal -> synchronously signal C with Shutdown
//   └── on C: any signal -> remove the cascade handler from P
//
// ============================================================================

pub(crate) type SignalHandler = Arc<dyn Fn(&Signal, &SignalContext) -> Handled + Send + Sync>;

/// Removal key returned by [`SignalHandlers::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct HandlerKey(u64);

struct HandlerLog {
    next: u64,
    entries: BTreeMap<u64, SignalHandler>,
}

/// Ordered signal handlers of one actor
pub(crate) struct SignalHandlers {
    log: Mutex<HandlerLog>,
}

impl SignalHandlers {
    pub(crate) fn new() -> Self {
        Self {
            log: Mutex::new(HandlerLog {
                next: 0,
                entries: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandlerLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, handler: SignalHandler) -> HandlerKey {
        let mut log = self.lock();
        let key = log.next;
        log.next += 1;
        log.entries.insert(key, handler);
        HandlerKey(key)
    }

    pub(crate) fn remove(&self, key: HandlerKey) -> bool {
        self.lock().entries.remove(&key.0).is_some()
    }

    /// Handlers in ascending registration order. The lock is released
    /// before any handler runs, so handlers may register or remove freely.
    pub(crate) fn snapshot(&self) -> Vec<(HandlerKey, SignalHandler)> {
        self.lock()
            .entries
            .iter()
            .map(|(key, handler)| (HandlerKey(*key), Arc::clone(handler)))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.lock().entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

/// How supervision of one signal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SupervisionOutcome {
    /// Every handler ran; the actor terminates
    Terminate,
    /// A handler asked for a fresh behavior; remaining handlers were skipped
    Restart,
}

/// Runs every handler of `node` for `signal`, in registration order.
///
/// A failing handler is logged and does not stop the ones after it.
pub(crate) fn run_handlers(node: &dyn ActorNode, signal: &Signal, ctx: &SignalContext) -> SupervisionOutcome {
    tracing::debug!(actor = %node.name(), signal = %signal, "Running supervision");

    for (key, handler) in node.handlers().snapshot() {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(signal, ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(Unwind::Restart(_))) => {
                tracing::debug!(actor = %node.name(), handler = key.0, "Signal handler requested restart");
                return SupervisionOutcome::Restart;
            }
            Ok(Err(Unwind::Panic(error))) => {
                metrics::global().record_handler_failure();
                tracing::warn!(
                    actor = %node.name(),
                    handler = key.0,
                    error = %error,
                    "Signal handler failed"
                );
            }
            Err(payload) => {
                metrics::global().record_handler_failure();
                tracing::warn!(
                    actor = %node.name(),
                    handler = key.0,
                    error = %panic_message(payload.as_ref()),
                    "Signal handler panicked"
                );
            }
        }
    }

    SupervisionOutcome::Terminate
}

/// The pair of handlers that ties a child's lifetime to its parent
pub(crate) struct CascadeLink {
    parent: Arc<dyn ActorNode>,
    parent_key: HandlerKey,
    child: Arc<dyn ActorNode>,
    child_key: HandlerKey,
}

impl CascadeLink {
    /// Removes both handlers, used when the child fails to start
    pub(crate) fn undo(self) {
        self.parent.handlers().remove(self.parent_key);
        self.child.handlers().remove(self.child_key);
    }
}

/// Installs the shutdown cascade between `parent` and `child`
pub(crate) fn link(parent: &Arc<dyn ActorNode>, child: &Arc<dyn ActorNode>) -> CascadeLink {
    let target = Arc::clone(child);
    let parent_key = parent.handlers().register(Arc::new(move |_signal: &Signal, ctx: &SignalContext| -> Handled {
        ctx.signal_node(&target, Signal::Shutdown)?;
        Ok(())
    }));

    let weak_parent = Arc::downgrade(parent);
    let child_key = child.handlers().register(Arc::new(move |_signal: &Signal, _ctx: &SignalContext| -> Handled {
        if let Some(parent) = weak_parent.upgrade() {
            parent.handlers().remove(parent_key);
        }
        Ok(())
    }));

    CascadeLink {
        parent: Arc::clone(parent),
        parent_key,
        child: Arc::clone(child),
        child_key,
    }
}

// ============================================================================
// Supervision Strategies
// ============================================================================

/// Ready-made reaction to failures, installed with
/// [`ActorHandle::supervise`](crate::ActorHandle::supervise)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionStrategy {
    /// Restart on panic, at most `max_restarts` times over the actor's life
    Restart { max_restarts: u32 },
    /// Stop permanently on failure
    Stop,
}

impl SupervisionStrategy {
    pub fn restart(max_restarts: u32) -> Self {
        SupervisionStrategy::Restart { max_restarts }
    }

    pub(crate) fn into_handler(self) -> impl Fn(&Signal, &SignalContext) -> Handled + Send + Sync + 'static {
        let restarts = AtomicU32::new(0);

        move |signal: &Signal, ctx: &SignalContext| -> Handled {
            let (SupervisionStrategy::Restart { max_restarts }, Signal::Panic(cause)) = (self, signal) else {
                return Ok(());
            };

            let performed = restarts.load(Ordering::SeqCst);
            if performed >= max_restarts {
                tracing::error!(
                    actor = %ctx.actor_name(),
                    max_restarts = max_restarts,
                    error = %cause,
                    "Restart limit reached, stopping actor"
                );
                return Ok(());
            }

            restarts.store(performed + 1, Ordering::SeqCst);
            tracing::warn!(
                actor = %ctx.actor_name(),
                attempt = performed + 1,
                max_restarts = max_restarts,
                error = %cause,
                "Actor panicked, restarting"
            );
            Err(ctx.restart())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recording(log: &Arc<StdMutex<Vec<u32>>>, id: u32) -> SignalHandler {
        let log = log.clone();
        Arc::new(move |_: &Signal, _: &SignalContext| -> Handled {
            log.lock().unwrap().push(id);
            Ok(())
        })
    }

    #[test]
    fn test_snapshot_in_registration_order() {
        let handlers = SignalHandlers::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let keys: Vec<_> = (0..5).map(|id| handlers.register(recording(&log, id))).collect();

        let snapshot = handlers.snapshot();
        let order: Vec<_> = snapshot.iter().map(|(key, _)| *key).collect();
        assert_eq!(order, keys);
    }

    #[test]
    fn test_keys_never_reused_after_removal() {
        let handlers = SignalHandlers::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let first = handlers.register(recording(&log, 1));
        let second = handlers.register(recording(&log, 2));
        assert!(handlers.remove(first));
        assert!(!handlers.remove(first));

        let third = handlers.register(recording(&log, 3));
        assert!(third > second);

        handlers.clear();
        let fourth = handlers.register(recording(&log, 4));
        assert!(fourth > third);
        assert_eq!(handlers.len(), 1);
    }

    #[test]
    fn test_concurrent_registration_keeps_order() {
        let handlers = Arc::new(SignalHandlers::new());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let workers: Vec<_> = (0..4)
            .map(|id| {
                let handlers = handlers.clone();
                let log = log.clone();
                std::thread::spawn(move || {
                    (0..25).map(|_| handlers.register(recording(&log, id))).collect::<Vec<_>>()
                })
            })
            .collect();
        for worker in workers {
            let keys = worker.join().unwrap();
            assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        }

        let snapshot = handlers.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert!(snapshot.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn test_restart_helper_constructor() {
        assert_eq!(
            SupervisionStrategy::restart(2),
            SupervisionStrategy::Restart { max_restarts: 2 }
        );
    }
}
