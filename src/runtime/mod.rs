// ============================================================================
// Runtime Host
// ============================================================================
//
// Configuration and the schedulers that host actor execution loops.
//
// ============================================================================

mod config;
mod scheduler;

pub use config::RuntimeConfig;
pub use scheduler::{Completion, Scheduler, ThreadScheduler, TokioScheduler, Work};
