//! Scoped locking primitives.
//!
//! - [`RunLock`]: process-local binary lock with bounded, cancellable waits.
//! - [`LockGuard`]: the release-on-drop handle it returns.

mod lock;

pub use lock::{LockGuard, RunLock};
