//! Typed actor runtime.
//!
//! Actors own a private behavior value, process messages one at a time in
//! FIFO order and are supervised through ordered signal handlers. A parent
//! that handles any signal shuts its spawned children down first.
//!
//! ```no_run
//! use typed_actors::{run, ActorHandle};
//!
//! struct Counter(u64);
//!
//! let counter = ActorHandle::<Counter>::named("counter");
//! counter.behavior(|_| Counter(0)).unwrap();
//!
//! run([counter.erase()], |ctx| {
//!     ctx.post_to(&counter, |c, ctx| {
//!         c.0 += 1;
//!         ctx.shutdown()?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })
//! .unwrap();
//! ```

pub mod actors;
pub mod error;
pub mod metrics;
pub mod runtime;

pub use actors::{
    run, set_panic_reporter, ActorContext, ActorHandle, ActorState, AnyActorHandle, Handled, Runner, Signal,
    SignalContext, StartupContext, SupervisionStrategy, Unwind,
};
pub use error::ActorError;
pub use runtime::{RuntimeConfig, ThreadScheduler, TokioScheduler};
