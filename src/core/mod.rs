//! Runtime core: running the configured rules.
//!
//! - [`RunCoordinator`]: one single-flight run: lock, activate, execute, publish.
//! - [`RunLoop`]: repeats runs on the configured frequency.
//! - [`shutdown`]: OS signal handling for [`RunLoop::run_until_signal`].

mod coordinator;
mod run_loop;
pub mod shutdown;

pub use coordinator::{CoordinatorBuilder, RUN_LOCK_TIMEOUT, RunCoordinator, RunPhase};
pub use run_loop::RunLoop;
