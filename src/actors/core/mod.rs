// ============================================================================
// Core Actor Primitives
// ============================================================================
//
// Leaf types shared by every other part of the runtime: lifecycle state,
// signals and unwinding, and the mailbox.
//
// ============================================================================

mod mailbox;
mod signal;
mod state;

pub(crate) use mailbox::{Mailbox, MailboxReceiver};
pub(crate) use signal::RestartRequest;
pub use signal::{Handled, Signal, Unwind};
pub use state::ActorState;
pub(crate) use state::AtomicActorState;
