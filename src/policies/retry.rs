//! # Retry policy wrapping calls against the backing table.
//!
//! [`RetryPolicy`] is the single resilience decorator shared by point reads and
//! batch writes, so both call sites behave identically:
//!
//! ```text
//! run(ctx, op)
//!   loop {
//!     ├─► op() under per-attempt timeout (cancellable)
//!     │     ├─ Ok(v)                         ─► return Ok(v)
//!     │     ├─ Err(retryable), retries left  ─► sleep(backoff.next(n)) (cancellable), continue
//!     │     └─ Err(other) / no retries left  ─► return Err(last error)
//!     └─ ctx cancelled at any point          ─► return Err(Cancelled)
//!   }
//! ```
//!
//! Partial-failure bodies (unprocessed batch items) are *successful* responses
//! from this policy's point of view; the caller handles them.

use std::future::Future;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::TableError;
use crate::policies::backoff::BackoffPolicy;

/// Retry with backoff plus a per-attempt timeout.
///
/// ## Sentinel values
/// - `attempt_timeout = 0s` → attempts are not time-bounded.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt (`4` → 5 attempts total).
    pub max_retries: u32,
    /// Delay shape between attempts.
    pub backoff: BackoffPolicy,
    /// Time budget of a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    /// 4 retries, exponential backoff from 2s with jitter, 10s per attempt.
    fn default() -> Self {
        Self {
            max_retries: 4,
            backoff: BackoffPolicy::default(),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non-retryable error, or runs out of retries.
    ///
    /// `op` is called once per attempt and must build a fresh future each time.
    /// Cancellation of `ctx` aborts immediately with [`TableError::Cancelled`],
    /// whether it happens during an attempt or during a backoff sleep.
    pub async fn run<T, F, Fut>(&self, ctx: &CancellationToken, mut op: F) -> Result<T, TableError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TableError>>,
    {
        let mut retry: u32 = 0;

        loop {
            if ctx.is_cancelled() {
                return Err(TableError::Cancelled);
            }

            let res = select! {
                biased;
                _ = ctx.cancelled() => return Err(TableError::Cancelled),
                res = self.attempt(op()) => res,
            };

            let err = match res {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && retry < self.max_retries => e,
                Err(e) => return Err(e),
            };

            let delay = self.backoff.next(retry);
            retry += 1;
            warn!(
                error = %err,
                label = err.as_label(),
                retry,
                max_retries = self.max_retries,
                ?delay,
                "backing table call failed, retrying"
            );

            select! {
                biased;
                _ = ctx.cancelled() => return Err(TableError::Cancelled),
                _ = time::sleep(delay) => {}
            }
        }
    }

    async fn attempt<T, Fut>(&self, fut: Fut) -> Result<T, TableError>
    where
        Fut: Future<Output = Result<T, TableError>>,
    {
        if self.attempt_timeout == Duration::ZERO {
            return fut.await;
        }
        match time::timeout(self.attempt_timeout, fut).await {
            Ok(res) => res,
            Err(_elapsed) => Err(TableError::Timeout {
                timeout: self.attempt_timeout,
            }),
        }
    }
}
