//! # Limited-group classifier (bounded-concurrency gate)
//!
//! Admits at most `capacity` tasks at a time under one fixed label. Callers
//! beyond capacity suspend inside [`Classifier::assign`] until a slot frees,
//! their context is cancelled, or the classifier's own timeout elapses.
//!
//! ## Hand-off
//! ```text
//! assign():  label != fixed label ─► Err(InvalidOptions)
//!            lock ─► len < capacity ? insert, Ok
//!                 └► wait on vacancy  ─┬─ vacancy  ─► retry from lock
//!                                      ├─ ctx      ─► Err(Canceled)
//!                                      └─ deadline ─► Err(Timeout)
//!
//! unassign(): lock ─► remove ─► len == capacity-1 ? vacancy.notify_one()
//! ```
//!
//! The vacancy signal is a single stored permit (`Notify::notify_one`), not a
//! counting release. It guarantees minimum progress: every vacancy retries at
//! least one waiter. It does not guarantee FIFO order, and a woken waiter may
//! lose the slot to a newcomer and go back to waiting.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classifiers::{Classifier, ClassifierOptions, normalize_label};
use crate::error::ClassifierError;
use crate::sync::lock;
use crate::tasks::TaskId;

/// Configuration of a [`LimitedGroup`].
#[derive(Clone, Debug)]
pub struct LimitedGroupConfig {
    /// Fixed label answered by [`Classifier::get`].
    pub label: String,

    /// Maximum number of admitted tasks (min 1; clamped).
    pub capacity: usize,

    /// Maximum time a caller waits for a slot.
    ///
    /// - `Duration::ZERO` = wait until a slot frees or the caller cancels
    pub timeout: Duration,
}

impl LimitedGroupConfig {
    pub fn new(label: impl Into<String>, capacity: usize, timeout: Duration) -> Self {
        Self {
            label: label.into(),
            capacity,
            timeout,
        }
    }

    /// Returns the wait timeout as an `Option` (`None` = no engine timeout).
    #[inline]
    pub fn wait_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }
}

/// Fixed-capacity set of admitted task ids.
pub struct LimitedGroup {
    label: String,
    capacity: usize,
    timeout: Option<Duration>,
    admitted: Mutex<HashSet<TaskId>>,
    vacancy: Notify,
}

impl LimitedGroup {
    pub fn new(cfg: LimitedGroupConfig) -> Self {
        Self {
            label: normalize_label(&cfg.label),
            capacity: cfg.capacity.max(1),
            timeout: cfg.wait_timeout(),
            admitted: Mutex::new(HashSet::new()),
            vacancy: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Normalized fixed label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Admits `task` if a slot is free.
    fn try_admit(&self, task: TaskId) -> Result<bool, ClassifierError> {
        let mut admitted = lock(&self.admitted);
        if admitted.contains(&task) {
            return Err(ClassifierError::AlreadyMember {
                label: self.label.clone(),
                task,
            });
        }
        if admitted.len() < self.capacity {
            admitted.insert(task);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl Classifier for LimitedGroup {
    async fn assign(
        &self,
        ctx: &CancellationToken,
        task: TaskId,
        options: &dyn ClassifierOptions,
    ) -> Result<(), ClassifierError> {
        options.validate()?;
        let label = normalize_label(options.label());
        if label != self.label {
            return Err(ClassifierError::InvalidOptions {
                reason: format!("label {label:?} does not match group {:?}", self.label),
            });
        }
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            if self.try_admit(task)? {
                return Ok(());
            }
            debug!(label = %self.label, %task, capacity = self.capacity, "waiting for a free slot");

            let expired = async {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.vacancy.notified() => continue,
                _ = ctx.cancelled() => return Err(ClassifierError::Canceled),
                _ = expired => {
                    return Err(ClassifierError::Timeout {
                        label: self.label.clone(),
                        timeout: self.timeout.unwrap_or_default(),
                    });
                }
            }
        }
    }

    fn unassign(&self, task: TaskId) {
        let mut admitted = lock(&self.admitted);
        if admitted.remove(&task) && admitted.len() == self.capacity - 1 {
            self.vacancy.notify_one();
        }
    }

    /// Full admitted set if `labels` contains the fixed label, else nothing.
    fn get(&self, labels: &[&str]) -> Vec<TaskId> {
        if !labels.iter().any(|l| normalize_label(l) == self.label) {
            return Vec::new();
        }
        let admitted = lock(&self.admitted);
        admitted.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    fn len(&self) -> usize {
        lock(&self.admitted).len()
    }

    fn name(&self) -> &'static str {
        "limited-group"
    }
}
