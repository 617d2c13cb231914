//! # Pool configuration.
//!
//! Provides [`PoolConfig`], the settings a [`Pool`](crate::Pool) is built with.
//!
//! ## Sentinel values
//! - `eviction_delay = 0s` → a released task is evicted immediately
//! - `progress_capacity = 0` → clamped to 1

use std::time::Duration;

/// Configuration for a [`Pool`](crate::Pool).
///
/// ## Field semantics
/// - `eviction_delay`: How long a released task stays queryable (`0s` = evict on release)
/// - `progress_capacity`: Bounded progress queue per task (min 1; clamped)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking the
/// sentinels directly.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Grace window between release and eviction from the task table.
    ///
    /// During the window `stat`, `err` and `wait` still answer for the task;
    /// afterwards they return [`PoolError::NotFound`](crate::PoolError::NotFound).
    pub eviction_delay: Duration,

    /// Capacity of each task's progress queue towards the reporter.
    ///
    /// Updates beyond capacity are dropped from the stream (the latest value
    /// is still visible through `stat`).
    pub progress_capacity: usize,
}

impl PoolConfig {
    /// Returns the eviction delay as an `Option`.
    ///
    /// - `None` → evict as soon as the task releases
    /// - `Some(d)` → keep the task queryable for `d`
    #[inline]
    pub fn eviction_window(&self) -> Option<Duration> {
        if self.eviction_delay == Duration::ZERO {
            None
        } else {
            Some(self.eviction_delay)
        }
    }

    /// Returns a progress capacity clamped to a minimum of 1.
    #[inline]
    pub fn progress_capacity_clamped(&self) -> usize {
        self.progress_capacity.max(1)
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `eviction_delay = 30s`
    /// - `progress_capacity = 16`
    fn default() -> Self {
        Self {
            eviction_delay: Duration::from_secs(30),
            progress_capacity: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let cfg = PoolConfig {
            eviction_delay: Duration::ZERO,
            progress_capacity: 0,
        };
        assert_eq!(cfg.eviction_window(), None);
        assert_eq!(cfg.progress_capacity_clamped(), 1);

        let cfg = PoolConfig::default();
        assert_eq!(cfg.eviction_window(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.progress_capacity_clamped(), 16);
    }
}
