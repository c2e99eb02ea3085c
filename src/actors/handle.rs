use std::any::{self, Any};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::oneshot;

use crate::actors::context::{ActorContext, SignalContext};
use crate::actors::core::{ActorState, AtomicActorState, Handled, Mailbox, Signal};
use crate::actors::execution::ExecutionLoop;
use crate::actors::runner::RunScope;
use crate::actors::supervision::{SignalHandlers, SupervisionStrategy};
use crate::actors::unit::{self, UnitId};
use crate::error::ActorError;
use crate::metrics;

// ============================================================================
// Actor Handle
// ============================================================================
//
// Immutable identity (name, behavior type, creator), the atomic lifecycle
// state, the behavior factory, the mailbox and the ordered signal handlers.
//
// Configuration (behavior, on_signal) is only legal from the execution unit
// that created the handle and only while the handle is CREATED.
//
// ============================================================================

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Message<B> = Box<dyn FnOnce(&mut B, &ActorContext) -> Handled + Send>;
pub(crate) type BehaviorFactory<B> = Arc<dyn Fn(&ActorContext) -> B + Send + Sync>;

/// What travels through a mailbox
pub(crate) enum Envelope<B> {
    /// Application message, dispatched against the behavior
    Message(Message<B>),
    /// Fire-and-forget shutdown. Requeued once (`drained`) so that messages
    /// which arrived after the request are processed before stopping.
    ShutdownRequest { drained: bool },
    /// Synchronous signal; the sender blocks until `ack` fires
    Signal {
        signal: Signal,
        ack: oneshot::Sender<()>,
    },
}

/// Shared state behind an [`ActorHandle`]
pub(crate) struct ActorCell<B: 'static> {
    name: String,
    creator: UnitId,
    state: AtomicActorState,
    factory: OnceLock<BehaviorFactory<B>>,
    mailbox: Mailbox<Envelope<B>>,
    handlers: SignalHandlers,
}

impl<B: 'static> ActorCell<B> {
    pub(crate) fn factory(&self) -> Option<BehaviorFactory<B>> {
        self.factory.get().cloned()
    }

    pub(crate) fn mailbox(&self) -> &Mailbox<Envelope<B>> {
        &self.mailbox
    }

    pub(crate) fn lifecycle(&self) -> &AtomicActorState {
        &self.state
    }
}

/// Type-erased view of an actor, used wherever the behavior type is irrelevant
pub(crate) trait ActorNode: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn state(&self) -> ActorState;
    fn creator(&self) -> UnitId;
    fn has_behavior(&self) -> bool;
    fn handlers(&self) -> &SignalHandlers;
    fn request_shutdown(&self);
    fn deliver_signal(&self, signal: Signal, ack: oneshot::Sender<()>);
    /// CREATED -> RUNNING, then hands the execution loop to the scope's scheduler
    fn start(self: Arc<Self>, scope: &Arc<RunScope>) -> Result<(), ActorError>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<B: 'static> ActorNode for ActorCell<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ActorState {
        self.state.load()
    }

    fn creator(&self) -> UnitId {
        self.creator
    }

    fn has_behavior(&self) -> bool {
        self.factory.get().is_some()
    }

    fn handlers(&self) -> &SignalHandlers {
        &self.handlers
    }

    fn request_shutdown(&self) {
        self.mailbox.offer(Envelope::ShutdownRequest { drained: false });
    }

    fn deliver_signal(&self, signal: Signal, ack: oneshot::Sender<()>) {
        self.mailbox.offer(Envelope::Signal { signal, ack });
    }

    fn start(self: Arc<Self>, scope: &Arc<RunScope>) -> Result<(), ActorError> {
        if !self.has_behavior() {
            return Err(ActorError::illegal(format!("actor {} has no behavior", self.name)));
        }
        if !self.state.transition(ActorState::Created, ActorState::Running) {
            return Err(ActorError::illegal(format!(
                "actor {} is {}, expected CREATED",
                self.name,
                self.state.load()
            )));
        }
        let Some(receiver) = self.mailbox.receiver() else {
            self.state.transition(ActorState::Running, ActorState::Shutdown);
            return Err(ActorError::illegal(format!(
                "actor {} already has an execution loop",
                self.name
            )));
        };

        let cell = Arc::clone(&self);
        let loop_scope = Arc::clone(scope);
        let launched = scope.launch(
            &cell.name,
            Box::new(move || {
                let _unit = unit::enter();
                ExecutionLoop::new(self, receiver, loop_scope).run()
            }),
        );

        match launched {
            Ok(()) => {
                metrics::global().record_actor_started();
                tracing::info!(actor = %cell.name, "Actor started");
                Ok(())
            }
            Err(e) => {
                cell.state.transition(ActorState::Running, ActorState::Shutdown);
                Err(e)
            }
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Checks that the calling execution unit may start `node` right now
pub(crate) fn ensure_startable(node: &dyn ActorNode) -> Result<(), ActorError> {
    if node.creator() != unit::current() {
        return Err(ActorError::illegal(format!(
            "actor {} can only be started by its creator",
            node.name()
        )));
    }
    if !node.state().is_created() {
        return Err(ActorError::illegal(format!(
            "actor {} is {}, expected CREATED",
            node.name(),
            node.state()
        )));
    }
    if !node.has_behavior() {
        return Err(ActorError::illegal(format!("actor {} has no behavior", node.name())));
    }
    Ok(())
}

pub(crate) fn same_actor(a: &Arc<dyn ActorNode>, b: &Arc<dyn ActorNode>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Default name: the behavior type's short name plus a process-wide counter
fn default_name<B>() -> String {
    let full = any::type_name::<B>();
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    let id = NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed);
    format!("{short}-{id}")
}

/// Addressable handle to an actor whose behavior type is `B`
pub struct ActorHandle<B: 'static> {
    cell: Arc<ActorCell<B>>,
}

impl<B: 'static> ActorHandle<B> {
    /// Creates a CREATED handle with a generated name
    pub fn of() -> Self {
        Self::named(default_name::<B>())
    }

    /// Creates a CREATED handle with an explicit name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            cell: Arc::new(ActorCell {
                name: name.into(),
                creator: unit::current(),
                state: AtomicActorState::new(),
                factory: OnceLock::new(),
                mailbox: Mailbox::new(),
                handlers: SignalHandlers::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    pub fn state(&self) -> ActorState {
        self.cell.state.load()
    }

    /// Sets the behavior factory. It is invoked on start and on every restart.
    pub fn behavior<F>(&self, factory: F) -> Result<(), ActorError>
    where
        F: Fn(&ActorContext) -> B + Send + Sync + 'static,
    {
        self.ensure_configurable("behavior")?;
        self.cell
            .factory
            .set(Arc::new(factory))
            .map_err(|_| ActorError::illegal(format!("actor {} already has a behavior", self.name())))
    }

    /// Appends a signal handler. Handlers run in registration order.
    pub fn on_signal<F>(&self, handler: F) -> Result<(), ActorError>
    where
        F: Fn(&Signal, &SignalContext) -> Handled + Send + Sync + 'static,
    {
        self.ensure_configurable("on_signal")?;
        self.cell.handlers.register(Arc::new(handler));
        Ok(())
    }

    /// Registers a signal handler implementing `strategy`
    pub fn supervise(&self, strategy: SupervisionStrategy) -> Result<(), ActorError> {
        self.on_signal(strategy.into_handler())
    }

    /// Type-erased handle, for mixing behavior types in one [`run`](crate::run) call
    pub fn erase(&self) -> AnyActorHandle {
        AnyActorHandle { node: self.node() }
    }

    pub(crate) fn from_cell(cell: Arc<ActorCell<B>>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<ActorCell<B>> {
        &self.cell
    }

    pub(crate) fn node(&self) -> Arc<dyn ActorNode> {
        self.cell.clone()
    }

    fn ensure_configurable(&self, operation: &str) -> Result<(), ActorError> {
        if self.cell.creator != unit::current() {
            return Err(ActorError::illegal(format!(
                "{operation} on actor {} called outside its creator",
                self.name()
            )));
        }
        let state = self.state();
        if !state.is_created() {
            return Err(ActorError::illegal(format!(
                "{operation} on actor {} requires CREATED, found {state}",
                self.name()
            )));
        }
        Ok(())
    }
}

impl<B: 'static> Clone for ActorHandle<B> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<B: 'static> PartialEq for ActorHandle<B> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<B: 'static> Eq for ActorHandle<B> {}

impl<B: 'static> fmt::Debug for ActorHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("name", &self.name())
            .field("behavior", &any::type_name::<B>())
            .field("state", &self.state())
            .finish()
    }
}

/// Handle with the behavior type erased
#[derive(Clone)]
pub struct AnyActorHandle {
    node: Arc<dyn ActorNode>,
}

impl AnyActorHandle {
    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn state(&self) -> ActorState {
        self.node.state()
    }

    pub(crate) fn node(&self) -> &Arc<dyn ActorNode> {
        &self.node
    }
}

impl fmt::Debug for AnyActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyActorHandle")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

impl<B: 'static> From<&ActorHandle<B>> for AnyActorHandle {
    fn from(handle: &ActorHandle<B>) -> Self {
        handle.erase()
    }
}

impl<B: 'static> From<ActorHandle<B>> for AnyActorHandle {
    fn from(handle: ActorHandle<B>) -> Self {
        handle.erase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    #[test]
    fn test_default_name_uses_type_and_counter() {
        let a = ActorHandle::<Greeter>::of();
        let b = ActorHandle::<Greeter>::of();
        assert!(a.name().starts_with("Greeter-"));
        assert!(b.name().starts_with("Greeter-"));
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_new_handle_is_created() {
        let handle = ActorHandle::<Greeter>::named("greeter");
        assert_eq!(handle.name(), "greeter");
        assert_eq!(handle.state(), ActorState::Created);
    }

    #[test]
    fn test_behavior_set_twice_fails() {
        let handle = ActorHandle::<Greeter>::named("greeter");
        handle.behavior(|_| Greeter).unwrap();

        let err = handle.behavior(|_| Greeter).unwrap_err();
        assert!(err.is_illegal_state());
    }

    #[test]
    fn test_configuration_from_other_thread_fails() {
        let handle = ActorHandle::<Greeter>::named("greeter");
        let remote = handle.clone();

        let (behavior, signal) = std::thread::spawn(move || {
            let behavior = remote.behavior(|_| Greeter);
            let signal = remote.on_signal(|_, _| Ok(()));
            (behavior, signal)
        })
        .join()
        .unwrap();

        assert!(behavior.unwrap_err().is_illegal_state());
        assert!(signal.unwrap_err().is_illegal_state());
        assert!(!handle.cell().has_behavior());
    }

    #[test]
    fn test_configuration_after_start_fails() {
        let handle = ActorHandle::<Greeter>::named("greeter");
        handle.cell().lifecycle().transition(ActorState::Created, ActorState::Running);

        assert!(handle.behavior(|_| Greeter).unwrap_err().is_illegal_state());
        assert!(handle.on_signal(|_, _| Ok(())).unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_ensure_startable_requires_behavior() {
        let handle = ActorHandle::<Greeter>::named("greeter");
        assert!(ensure_startable(handle.node().as_ref()).is_err());

        handle.behavior(|_| Greeter).unwrap();
        assert!(ensure_startable(handle.node().as_ref()).is_ok());
    }

    #[test]
    fn test_erased_handle_identity() {
        let handle = ActorHandle::<Greeter>::named("greeter");
        let erased: AnyActorHandle = (&handle).into();
        assert!(same_actor(erased.node(), &handle.node()));
        assert_eq!(erased.name(), "greeter");
    }
}
