use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::actors::context::{ActorContext, SignalContext};
use crate::actors::core::{ActorState, Handled, MailboxReceiver, Signal, Unwind};
use crate::actors::handle::{ActorCell, ActorNode, Envelope, Message};
use crate::actors::reporter;
use crate::actors::runner::RunScope;
use crate::actors::supervision::{self, SupervisionOutcome};
use crate::error::panic_message;
use crate::metrics;

// ============================================================================
// Execution Loop
// ============================================================================
//
// One loop per actor, created at the CREATED -> RUNNING transition and run
// on the actor's own execution unit:
//
//   incarnate (behavior factory)
//   └── loop: take()
//       ├── message -> dispatch
//       │   ├── Ok             -> next message
//       │   ├── Unwind::Restart -> drop queued messages, incarnate again
//       │   └── Unwind::Panic   -> report, supervise(Panic), terminate
//       ├── shutdown request -> requeue once, then supervise(Shutdown)
//       └── signal  -> supervise(signal), terminate, acknowledge
//
// A handler returning Unwind::Restart during supervision keeps the actor
// RUNNING: queued application messages are dropped and the behavior is
// re-created. Queued shutdown requests and signals survive the restart, so
// a parent blocked on a cascade signal is always answered by a terminating
// child.
//
// The state moves to SHUTDOWN after the handlers have run, not before: a
// handler may still restart the actor, and the state never moves backward.
// Handlers therefore observe their own actor, and a cascading parent, as
// RUNNING.
//
// ============================================================================

enum Next {
    Restart,
    Terminate,
}

pub(crate) struct ExecutionLoop<B: 'static> {
    cell: Arc<ActorCell<B>>,
    mailbox: MailboxReceiver<Envelope<B>>,
    actor_ctx: ActorContext,
    signal_ctx: SignalContext,
}

impl<B: 'static> ExecutionLoop<B> {
    /// Must be called on the execution unit that will run the loop.
    pub(crate) fn new(cell: Arc<ActorCell<B>>, mailbox: MailboxReceiver<Envelope<B>>, scope: Arc<RunScope>) -> Self {
        let node: Arc<dyn ActorNode> = cell.clone();
        Self {
            actor_ctx: ActorContext::new(Arc::clone(&node), Arc::clone(&scope)),
            signal_ctx: SignalContext::new(node, scope),
            cell,
            mailbox,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!(actor = %self.cell.name(), "Execution loop started");

        'incarnation: loop {
            let mut behavior = match self.incarnate() {
                Ok(behavior) => behavior,
                Err(cause) => match self.fail(cause) {
                    Next::Restart => {
                        self.restart();
                        continue 'incarnation;
                    }
                    Next::Terminate => break 'incarnation,
                },
            };

            loop {
                let next = match self.mailbox.take() {
                    Ok(Envelope::Message(message)) => match self.dispatch(&mut behavior, message) {
                        Ok(()) => continue,
                        Err(Unwind::Restart(_)) => Next::Restart,
                        Err(Unwind::Panic(cause)) => self.fail(cause),
                    },
                    Ok(Envelope::ShutdownRequest { drained: false }) => {
                        self.cell
                            .mailbox()
                            .offer(Envelope::ShutdownRequest { drained: true });
                        continue;
                    }
                    Ok(Envelope::ShutdownRequest { drained: true }) => self.supervise(&Signal::Shutdown, None),
                    Ok(Envelope::Signal { signal, ack }) => self.supervise(&signal, Some(ack)),
                    Err(closed) => self.fail(anyhow::Error::new(closed).context("mailbox take interrupted")),
                };

                match next {
                    Next::Restart => {
                        self.restart();
                        continue 'incarnation;
                    }
                    Next::Terminate => break 'incarnation,
                }
            }
        }

        tracing::debug!(actor = %self.cell.name(), "Execution loop finished");
    }

    fn incarnate(&self) -> anyhow::Result<B> {
        let factory = self
            .cell
            .factory()
            .ok_or_else(|| anyhow::anyhow!("actor {} lost its behavior factory", self.cell.name()))?;

        panic::catch_unwind(AssertUnwindSafe(|| factory(&self.actor_ctx))).map_err(|payload| {
            anyhow::anyhow!("behavior factory panicked: {}", panic_message(payload.as_ref()))
        })
    }

    fn dispatch(&self, behavior: &mut B, message: Message<B>) -> Handled {
        let result = panic::catch_unwind(AssertUnwindSafe(|| message(behavior, &self.actor_ctx)))
            .unwrap_or_else(|payload| {
                Err(Unwind::Panic(anyhow::anyhow!(
                    "message handler panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        metrics::global().record_message_processed();
        result
    }

    /// Reports the failure, then supervises a panic signal
    fn fail(&self, cause: anyhow::Error) -> Next {
        metrics::global().record_panic();
        reporter::report(self.cell.name(), &cause);
        self.supervise(&Signal::panic(cause), None)
    }

    fn supervise(&self, signal: &Signal, ack: Option<oneshot::Sender<()>>) -> Next {
        let next = match supervision::run_handlers(&*self.cell, signal, &self.signal_ctx) {
            SupervisionOutcome::Restart => Next::Restart,
            SupervisionOutcome::Terminate => {
                self.terminate(signal);
                Next::Terminate
            }
        };

        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        next
    }

    fn terminate(&self, signal: &Signal) {
        self.cell
            .lifecycle()
            .transition(ActorState::Running, ActorState::Shutdown);
        let handlers = self.cell.handlers().len();
        self.cell.handlers().clear();
        metrics::global().record_actor_stopped(signal.kind());
        tracing::info!(
            actor = %self.cell.name(),
            signal = %signal,
            handlers = handlers,
            "Actor shut down"
        );
    }

    fn restart(&mut self) {
        let dropped = self.mailbox.clear(|envelope| !matches!(envelope, Envelope::Message(_)));
        metrics::global().record_restart();
        tracing::warn!(
            actor = %self.cell.name(),
            dropped_messages = dropped,
            "Restarting actor with a fresh behavior"
        );
    }
}
