//! # Backoff between start attempts.
//!
//! [`BackoffPolicy`] computes how long a caller waits before retrying a
//! `start_task` that was rejected with a target conflict.
//!
//! The delay for attempt `n` (0-indexed) is `first × factor^n`, capped at
//! `max`, then jittered. The base is derived from the attempt number alone,
//! so a short jittered delay never shrinks the next one.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskpool::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(250));
//! assert_eq!(backoff.next(2), Duration::from_secs(1));
//! assert_eq!(backoff.next(8), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Delay schedule for retried starts.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
    /// Growth per attempt (`1.0` = constant).
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 200ms`, `factor = 2.0`, `max = 10s`, equal jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(200),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Un-jittered delay for `attempt`, capped at `max`.
    pub fn base(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        }
    }

    /// Jittered delay for `attempt`.
    pub fn next(&self, attempt: u32) -> Duration {
        self.jitter
            .apply(self.base(attempt), self.first.min(self.max), self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_then_caps() {
        let p = exact(100, 1_000, 2.0);
        let delays: Vec<_> = (0..6).map(|n| p.next(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn constant_factor_keeps_first() {
        let p = exact(300, 10_000, 1.0);
        assert!((0..20).all(|n| p.next(n) == Duration::from_millis(300)));
    }

    #[test]
    fn overflow_and_oversized_first_clamp_to_max() {
        assert_eq!(exact(100, 5_000, 2.0).next(u32::MAX), Duration::from_secs(5));
        assert_eq!(exact(9_000, 5_000, 2.0).next(0), Duration::from_secs(5));
    }

    #[test]
    fn jitter_never_exceeds_base() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..exact(100, 30_000, 2.0)
        };
        for n in 0..12 {
            let base = p.base(n);
            let d = p.next(n);
            assert!(d >= base / 2 && d <= base, "attempt {n}: {d:?} vs {base:?}");
        }
    }
}
