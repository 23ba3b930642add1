//! # Backoff policy for retries.
//!
//! [`BackoffPolicy`] computes the delay before retry number `n` (0-indexed).
//! It is parameterized by:
//! - [`BackoffPolicy::first`] the delay before the first retry;
//! - [`BackoffPolicy::growth`] how the delay grows with `n`;
//! - [`BackoffPolicy::max`] the maximum delay cap;
//! - [`BackoffPolicy::jitter`] randomization applied after clamping.
//!
//! | growth                        | delay for retry `n`      |
//! |-------------------------------|--------------------------|
//! | [`Growth::Constant`]          | `first`                  |
//! | [`Growth::Linear`]            | `first × (n + 1)`        |
//! | [`Growth::Exponential`]       | `first × factor^n`       |
//!
//! The base delay depends only on `n`, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use runvisor::{BackoffPolicy, Growth, JitterPolicy};
//!
//! let rounds = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(10),
//!     growth: Growth::Linear,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(rounds.next(0), Duration::from_millis(500));
//! assert_eq!(rounds.next(1), Duration::from_millis(1000));
//! assert_eq!(rounds.next(4), Duration::from_millis(2500));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// How the delay grows with the retry number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Growth {
    /// Every retry waits `first`.
    Constant,
    /// Retry `n` waits `first × (n + 1)`.
    Linear,
    /// Retry `n` waits `first × factor^n`.
    Exponential {
        /// Multiplicative growth factor (`>= 1.0` recommended).
        factor: f64,
    },
}

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Growth shape.
    pub growth: Growth,
    /// Jitter applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Exponential doubling from 2s, capped at 30s, with equal jitter.
    ///
    /// This is the transport retry shape used against the backing table.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(2),
            max: Duration::from_secs(30),
            growth: Growth::Exponential { factor: 2.0 },
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Linear policy without jitter: retry `n` waits `step × (n + 1)`, capped at `max`.
    pub fn linear(step: Duration, max: Duration) -> Self {
        Self {
            first: step,
            max,
            growth: Growth::Linear,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay before retry `attempt` (0-indexed).
    ///
    /// Overflow, negative or non-finite intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let first = self.first.as_secs_f64();
        let unclamped = match self.growth {
            Growth::Constant => first,
            Growth::Linear => first * (f64::from(attempt) + 1.0),
            Growth::Exponential { factor } => {
                let exp = attempt.min(i32::MAX as u32) as i32;
                first * factor.powi(exp)
            }
        };

        let base = if !unclamped.is_finite()
            || unclamped < 0.0
            || unclamped > self.max.as_secs_f64()
        {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(growth: Growth) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            growth,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_attempt_zero_returns_first() {
        for growth in [
            Growth::Constant,
            Growth::Linear,
            Growth::Exponential { factor: 2.0 },
        ] {
            assert_eq!(policy(growth).next(0), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let p = policy(Growth::Exponential { factor: 2.0 });
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(2), Duration::from_millis(400));
        assert_eq!(p.next(3), Duration::from_millis(800));
    }

    #[test]
    fn test_linear_rounds_match_half_second_steps() {
        let p = BackoffPolicy::linear(Duration::from_millis(500), Duration::from_secs(60));
        let delays: Vec<_> = (0..5).map(|n| p.next(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(2000),
                Duration::from_millis(2500),
            ]
        );
    }

    #[test]
    fn test_constant_growth() {
        let p = policy(Growth::Constant);
        for attempt in 0..10 {
            assert_eq!(p.next(attempt), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_clamped_to_max() {
        let mut p = policy(Growth::Exponential { factor: 2.0 });
        p.max = Duration::from_secs(1);
        assert_eq!(p.next(10), Duration::from_secs(1));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_first_exceeds_max() {
        let p = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            growth: Growth::Linear,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_default_equal_jitter_bounds() {
        let p = BackoffPolicy::default();
        for attempt in 0..8 {
            let base = (2.0 * 2.0f64.powi(attempt as i32)).min(30.0);
            let delay = p.next(attempt);
            assert!(delay >= Duration::from_secs_f64(base / 2.0) - Duration::from_millis(1));
            assert!(delay <= Duration::from_secs_f64(base));
        }
    }
}
