// ============================================================================
// Actors Module
// ============================================================================
//
// Typed actors: each actor owns a private behavior value that only its own
// execution loop touches, a FIFO mailbox, and an ordered list of signal
// handlers that decide whether a failure stops or restarts it.
//
// Structure:
// - core/        - Mailbox, lifecycle state, signals and unwinding
// - handle       - ActorHandle (identity, configuration, type erasure)
// - context      - StartupContext, ActorContext, SignalContext
// - execution    - Per-actor execution loop
// - supervision  - Signal handler registry, spawn cascade, strategies
// - unit         - Execution unit identity used for ownership checks
// - reporter     - Uncaught failure reporting
// - runner       - Top-level run
//
// ============================================================================

mod context;
mod core;
mod execution;
mod handle;
mod reporter;
mod runner;
mod supervision;
mod unit;

pub use context::{ActorContext, SignalContext, StartupContext};
pub use self::core::{ActorState, Handled, Signal, Unwind};
pub use handle::{ActorHandle, AnyActorHandle};
pub use reporter::{set_panic_reporter, PanicReporter};
pub use runner::{run, Runner};
pub use supervision::SupervisionStrategy;
