//! # In-flight counter for graceful draining.
//!
//! Every `start_task` call enters the drain before doing fallible work and
//! holds an [`InflightGuard`] until it is completely finished (for admitted
//! tasks, until the driver task has released and reported).
//!
//! ```text
//! enter()        closed? ─► Err(Closed)
//!                else inflight += 1 ─► guard
//! guard drop     inflight -= 1 ─► 0 ? idle.notify_waiters()
//! wait_and_close loop { inflight == 0 ? closed = true, return : await idle }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::PoolError;
use crate::sync::lock;

#[derive(Default)]
struct State {
    inflight: usize,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct Drain {
    state: Mutex<State>,
    idle: Notify,
}

impl Drain {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one in-flight call; fails once the pool is closed.
    pub(crate) fn enter(self: &Arc<Self>) -> Result<InflightGuard, PoolError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(PoolError::Closed);
        }
        state.inflight += 1;
        Ok(InflightGuard {
            drain: Arc::clone(self),
        })
    }

    /// Waits for the counter to reach zero, then closes.
    pub(crate) async fn wait_and_close(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            {
                let mut state = lock(&self.state);
                if state.inflight == 0 {
                    state.closed = true;
                    return;
                }
            }
            idle.await;
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub(crate) fn inflight(&self) -> usize {
        lock(&self.state).inflight
    }

    fn leave(&self) {
        let mut state = lock(&self.state);
        state.inflight = state.inflight.saturating_sub(1);
        if state.inflight == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// Decrements the in-flight counter on drop.
pub(crate) struct InflightGuard {
    drain: Arc<Drain>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.drain.leave();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn close_waits_for_every_guard() {
        let drain = Drain::new();
        let a = drain.enter().unwrap();
        let b = drain.enter().unwrap();
        assert_eq!(drain.inflight(), 2);

        let closer = {
            let drain = Arc::clone(&drain);
            tokio::spawn(async move { drain.wait_and_close().await })
        };

        drop(a);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closer.is_finished());
        assert!(!drain.is_closed());

        drop(b);
        tokio::time::timeout(Duration::from_secs(1), closer)
            .await
            .unwrap()
            .unwrap();
        assert!(drain.is_closed());
        assert!(matches!(drain.enter(), Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn idle_drain_closes_immediately() {
        let drain = Drain::new();
        drain.wait_and_close().await;
        assert!(drain.is_closed());
    }
}
