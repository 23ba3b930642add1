//! Retry and backoff policies.
//!
//! This module groups the knobs that control **how often** a failing call
//! against the backing table is retried and **how long** to wait in between.
//!
//! ## Contents
//! - [`RetryPolicy`]   the resilience decorator (retries + per-attempt timeout)
//! - [`BackoffPolicy`] how delays evolve (first / growth / max + jitter)
//! - [`Growth`]        constant, linear or exponential growth
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! RemoteStateStore
//!   ├─► get_string  ─► RetryPolicy::run(get_item)
//!   └─► flush       ─► RetryPolicy::run(batch_write)      (transport failures)
//!                   └─► BackoffPolicy::linear(500ms)       (unprocessed rounds)
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 4 retries, 10s per attempt, `BackoffPolicy::default()`.
//! - `BackoffPolicy::default()` → first=2s, exponential ×2, max=30s, `JitterPolicy::Equal`.

mod backoff;
mod jitter;
mod retry;

pub use backoff::{BackoffPolicy, Growth};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
