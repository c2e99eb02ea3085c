use std::any;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::actors::core::{Handled, Signal, Unwind};
use crate::actors::handle::{ensure_startable, same_actor, ActorCell, ActorHandle, ActorNode, Envelope};
use crate::actors::runner::RunScope;
use crate::actors::supervision;
use crate::actors::unit::{self, UnitId};
use crate::error::ActorError;
use crate::metrics;

// ============================================================================
// Context Family
// ============================================================================
//
// One implementation, three capability views:
//
//   StartupContext  post_to, spawn                      (runner startup callback)
//   ActorContext    post_to, spawn, shutdown, panic,
//                   current_actor                       (behavior factory, messages)
//   SignalContext   post_to, signal, restart,
//                   current_actor                       (signal handlers)
//
// A context is bound to the execution unit that created it and is neither
// Send nor Sync; every operation re-checks the binding and the view.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum View {
    Startup,
    Behavior,
    Signal,
}

pub(crate) struct ContextCore {
    view: View,
    owner: UnitId,
    actor: Option<Arc<dyn ActorNode>>,
    scope: Arc<RunScope>,
    _unshared: PhantomData<*const ()>,
}

impl ContextCore {
    fn new(view: View, actor: Option<Arc<dyn ActorNode>>, scope: Arc<RunScope>) -> Self {
        Self {
            view,
            owner: unit::current(),
            actor,
            scope,
            _unshared: PhantomData,
        }
    }

    fn require(&self, allowed: &[View], operation: &str) -> Result<(), ActorError> {
        if unit::current() != self.owner {
            return Err(ActorError::illegal(format!(
                "{operation} called outside the execution unit that owns this context"
            )));
        }
        if !allowed.contains(&self.view) {
            return Err(ActorError::illegal(format!(
                "{operation} is not available in the {:?} context",
                self.view
            )));
        }
        Ok(())
    }

    fn current(&self, operation: &str) -> Result<&Arc<dyn ActorNode>, ActorError> {
        self.actor
            .as_ref()
            .ok_or_else(|| ActorError::illegal(format!("{operation} requires a current actor")))
    }

    fn actor_name(&self) -> &str {
        self.actor.as_ref().map(|actor| actor.name()).unwrap_or("<startup>")
    }

    fn post_to<T: 'static>(
        &self,
        target: &ActorHandle<T>,
        message: Box<dyn FnOnce(&mut T, &ActorContext) -> Handled + Send>,
    ) -> Result<(), ActorError> {
        self.require(&[View::Startup, View::Behavior, View::Signal], "post_to")?;
        target.cell().mailbox().offer(Envelope::Message(message));
        Ok(())
    }

    fn spawn<C: 'static>(&self, child: &ActorHandle<C>) -> Result<(), ActorError> {
        self.require(&[View::Startup, View::Behavior], "spawn")?;
        let node = child.node();
        ensure_startable(node.as_ref())?;

        let link = self.actor.as_ref().map(|parent| supervision::link(parent, &node));
        if let Err(e) = Arc::clone(&node).start(&self.scope) {
            if let Some(link) = link {
                link.undo();
            }
            return Err(e);
        }

        if self.actor.is_none() {
            self.scope.add_root(Arc::clone(&node));
        }
        tracing::debug!(parent = %self.actor_name(), child = %node.name(), "Spawned actor");
        Ok(())
    }

    fn current_actor<T: 'static>(&self) -> Result<ActorHandle<T>, ActorError> {
        self.require(&[View::Behavior, View::Signal], "current_actor")?;
        let actor = self.current("current_actor")?;
        Arc::clone(actor)
            .into_any()
            .downcast::<ActorCell<T>>()
            .map(ActorHandle::from_cell)
            .map_err(|_| {
                ActorError::illegal(format!(
                    "actor {} does not run behavior {}",
                    actor.name(),
                    any::type_name::<T>()
                ))
            })
    }

    fn shutdown(&self) -> Result<(), ActorError> {
        self.require(&[View::Behavior], "shutdown")?;
        let actor = self.current("shutdown")?;
        metrics::global().record_signal_sent(Signal::Shutdown.kind());
        actor.request_shutdown();
        tracing::debug!(actor = %actor.name(), "Shutdown requested");
        Ok(())
    }

    fn panic(&self, cause: anyhow::Error) -> Unwind {
        match self.require(&[View::Behavior], "panic") {
            Ok(()) => Unwind::Panic(cause),
            Err(misuse) => Unwind::Panic(anyhow::Error::new(misuse).context(cause)),
        }
    }

    fn restart(&self) -> Unwind {
        match self.require(&[View::Signal], "restart") {
            Ok(()) => Unwind::Restart(crate::actors::core::RestartRequest(())),
            Err(misuse) => Unwind::Panic(misuse.into()),
        }
    }

    fn signal_node(&self, target: &Arc<dyn ActorNode>, signal: Signal) -> Result<(), ActorError> {
        self.require(&[View::Signal], "signal")?;
        let actor = self.current("signal")?;
        if same_actor(actor, target) {
            return Err(ActorError::illegal(format!("actor {} cannot signal itself", actor.name())));
        }

        let state = target.state();
        if state.is_created() {
            return Err(ActorError::illegal(format!(
                "actor {} cannot be signalled before it is started",
                target.name()
            )));
        }
        if state.is_shutdown() {
            tracing::debug!(actor = %actor.name(), target = %target.name(), "Signal target already shut down");
            return Ok(());
        }

        let (ack, acknowledged) = oneshot::channel();
        metrics::global().record_signal_sent(signal.kind());
        tracing::debug!(actor = %actor.name(), target = %target.name(), signal = %signal, "Sending synchronous signal");
        target.deliver_signal(signal, ack);

        if acknowledged.blocking_recv().is_ok() {
            return Ok(());
        }
        // Acknowledgement dropped with the mailbox: delivered only if the
        // target reached SHUTDOWN.
        if target.state().is_shutdown() {
            tracing::debug!(target = %target.name(), "Signal target terminated before acknowledging");
            Ok(())
        } else {
            Err(ActorError::SignalLost {
                actor: target.name().to_string(),
            })
        }
    }
}

fn boxed<T, F>(message: F) -> Box<dyn FnOnce(&mut T, &ActorContext) -> Handled + Send>
where
    F: FnOnce(&mut T, &ActorContext) -> Handled + Send + 'static,
{
    Box::new(message)
}

// ============================================================================
// Views
// ============================================================================

/// Context handed to the runner's startup callback
pub struct StartupContext {
    core: ContextCore,
}

impl StartupContext {
    pub(crate) fn new(scope: Arc<RunScope>) -> Self {
        Self {
            core: ContextCore::new(View::Startup, None, scope),
        }
    }

    /// Enqueues `message` for `target`'s behavior
    pub fn post_to<T, F>(&self, target: &ActorHandle<T>, message: F) -> Result<(), ActorError>
    where
        T: 'static,
        F: FnOnce(&mut T, &ActorContext) -> Handled + Send + 'static,
    {
        self.core.post_to(target, boxed(message))
    }

    /// Starts `child` as an additional top-level actor of this run
    pub fn spawn<C: 'static>(&self, child: &ActorHandle<C>) -> Result<(), ActorError> {
        self.core.spawn(child)
    }
}

/// Context visible to a behavior factory and to messages
pub struct ActorContext {
    core: ContextCore,
}

impl ActorContext {
    pub(crate) fn new(actor: Arc<dyn ActorNode>, scope: Arc<RunScope>) -> Self {
        Self {
            core: ContextCore::new(View::Behavior, Some(actor), scope),
        }
    }

    /// Name of the actor this context belongs to
    pub fn actor_name(&self) -> &str {
        self.core.actor_name()
    }

    /// Enqueues `message` for `target`'s behavior
    pub fn post_to<T, F>(&self, target: &ActorHandle<T>, message: F) -> Result<(), ActorError>
    where
        T: 'static,
        F: FnOnce(&mut T, &ActorContext) -> Handled + Send + 'static,
    {
        self.core.post_to(target, boxed(message))
    }

    /// Starts `child`, created by this actor, as a child of this actor.
    ///
    /// Any signal later handled by this actor shuts the child down first.
    pub fn spawn<C: 'static>(&self, child: &ActorHandle<C>) -> Result<(), ActorError> {
        self.core.spawn(child)
    }

    /// Handle to the running actor, if its behavior type is `T`
    pub fn current_actor<T: 'static>(&self) -> Result<ActorHandle<T>, ActorError> {
        self.core.current_actor()
    }

    /// Requests an orderly shutdown behind every message already queued
    pub fn shutdown(&self) -> Result<(), ActorError> {
        self.core.shutdown()
    }

    /// Builds the unwind that fails this actor with `cause`.
    ///
    /// Return it from the message: `return Err(ctx.panic(cause))`.
    pub fn panic(&self, cause: impl Into<anyhow::Error>) -> Unwind {
        self.core.panic(cause.into())
    }
}

/// Context visible to signal handlers
pub struct SignalContext {
    core: ContextCore,
}

impl SignalContext {
    pub(crate) fn new(actor: Arc<dyn ActorNode>, scope: Arc<RunScope>) -> Self {
        Self {
            core: ContextCore::new(View::Signal, Some(actor), scope),
        }
    }

    /// Name of the actor this context belongs to
    pub fn actor_name(&self) -> &str {
        self.core.actor_name()
    }

    /// Enqueues `message` for `target`'s behavior
    pub fn post_to<T, F>(&self, target: &ActorHandle<T>, message: F) -> Result<(), ActorError>
    where
        T: 'static,
        F: FnOnce(&mut T, &ActorContext) -> Handled + Send + 'static,
    {
        self.core.post_to(target, boxed(message))
    }

    /// Handle to the running actor, if its behavior type is `T`
    pub fn current_actor<T: 'static>(&self) -> Result<ActorHandle<T>, ActorError> {
        self.core.current_actor()
    }

    /// Delivers `signal` to `target` and blocks until its supervision is done
    pub fn signal<T: 'static>(&self, target: &ActorHandle<T>, signal: Signal) -> Result<(), ActorError> {
        self.core.signal_node(&target.node(), signal)
    }

    /// Builds the unwind that restarts this actor with a fresh behavior and
    /// an empty mailbox.
    ///
    /// Return it from the handler: `return Err(ctx.restart())`.
    pub fn restart(&self) -> Unwind {
        self.core.restart()
    }

    pub(crate) fn signal_node(&self, target: &Arc<dyn ActorNode>, signal: Signal) -> Result<(), ActorError> {
        self.core.signal_node(target, signal)
    }
}
