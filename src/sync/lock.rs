//! # RunLock: a binary lock handing out scoped release guards.
//!
//! [`RunLock`] wraps a single-permit [`Semaphore`]. Acquiring returns a
//! [`LockGuard`] that owns the permit; the permit goes back when the guard is
//! released explicitly or dropped, so every exit path (early return, `?`,
//! panic unwinding, a cancelled future) frees the lock.
//!
//! ## Acquisition outcomes
//! ```text
//! acquire(timeout, ctx)
//!   ├─ permit granted          ─► Ok(LockGuard)
//!   ├─ ctx cancelled           ─► Err(LockError::Cancelled)
//!   └─ timeout elapsed         ─► Err(LockError::TimedOut)
//! ```
//!
//! A guard from [`RunLock::acquire_blocking`] is the same type as one from
//! [`RunLock::acquire`]; both release the same way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::LockError;

/// Process-local binary lock.
///
/// Cheap to clone; clones share the same permit.
#[derive(Clone, Debug)]
pub struct RunLock {
    sem: Arc<Semaphore>,
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLock {
    /// Creates a free lock.
    pub fn new() -> Self {
        Self {
            sem: Arc::new(Semaphore::new(1)),
        }
    }

    /// Waits up to `timeout` for the lock.
    ///
    /// Cancellation is checked first, so an already-cancelled `ctx` never takes the lock.
    pub async fn acquire(
        &self,
        timeout: Duration,
        ctx: &CancellationToken,
    ) -> Result<LockGuard, LockError> {
        let permit = self.sem.clone().acquire_owned();
        tokio::pin!(permit);

        select! {
            biased;
            _ = ctx.cancelled() => Err(LockError::Cancelled),
            res = &mut permit => match res {
                Ok(permit) => Ok(LockGuard::new(permit)),
                // The semaphore is never closed while a `RunLock` exists.
                Err(_closed) => Err(LockError::Cancelled),
            },
            _ = time::sleep(timeout) => Err(LockError::TimedOut { timeout }),
        }
    }

    /// Blocks the current thread for up to `timeout` waiting for the lock.
    ///
    /// Meant for synchronous teardown paths. Blocking a runtime worker thread
    /// while the holder needs that same thread to make progress deadlocks, so
    /// prefer [`RunLock::acquire`] from async code.
    pub fn acquire_blocking(&self, timeout: Duration) -> Result<LockGuard, LockError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_acquire() {
                return Ok(guard);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return Err(LockError::TimedOut { timeout });
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }

    /// Takes the lock if it is free right now.
    pub fn try_acquire(&self) -> Option<LockGuard> {
        self.sem
            .clone()
            .try_acquire_owned()
            .ok()
            .map(LockGuard::new)
    }

    /// Returns `true` while some guard holds the lock.
    pub fn is_held(&self) -> bool {
        self.sem.available_permits() == 0
    }
}

/// Releases the [`RunLock`] exactly once: on [`LockGuard::release`] or on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    permit: Option<OwnedSemaphorePermit>,
}

impl LockGuard {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self {
            permit: Some(permit),
        }
    }

    /// Releases the lock. Calling it again is a no-op.
    pub fn release(&mut self) {
        self.permit.take();
    }

    /// Returns `true` until the guard has been released.
    pub fn is_held(&self) -> bool {
        self.permit.is_some()
    }
}
