//! Error types used by the pool, its classifiers and tasks.
//!
//! This module defines the error enums surfaced by the crate:
//!
//! - [`TaskError`]: errors returned by task hooks (`before_start`, `main`, `on_success`).
//! - [`ClassifierError`]: label validation, assignment and registry failures.
//! - [`PoolError`]: admission and query failures returned by [`Pool`](crate::Pool).
//! - [`ConcurrentRunningError`]: the payload of [`PoolError::Conflict`].
//!
//! All enums provide `as_label` (stable snake_case label for logs/metrics).
//!
//! ## Propagation
//! ```text
//! admission      ──► PoolError returned synchronously from start_task()
//! before_start   ──► PoolError::Precondition(TaskError), task never runs
//! main/on_success──► stored on the task, read via Pool::err() / Pool::stat()
//! on_failure     ──► logged only, the original error is kept
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::tasks::{TaskId, Targets};

/// # Errors produced by task hooks.
///
/// `Canceled` is the distinguished value a task returns once it observes its
/// cancellation token; every other variant means the work itself failed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task observed cancellation and stopped.
    #[error("context cancelled")]
    Canceled,

    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Pre-flight validation rejected the task.
    #[error("precondition failed: {error}")]
    Precondition {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`TaskError::Precondition`].
    pub fn precondition(error: impl std::fmt::Display) -> Self {
        TaskError::Precondition {
            error: error.to_string(),
        }
    }

    /// Returns `true` for [`TaskError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskpool::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("disk busy").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Precondition { .. } => "task_precondition",
        }
    }
}

/// # Errors produced by classifiers and the classifier registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    /// Label is empty after trimming.
    #[error("label must not be empty")]
    EmptyLabel,

    /// Options failed their own validation.
    #[error("invalid classifier options: {reason}")]
    InvalidOptions {
        /// Why the options were rejected.
        reason: String,
    },

    /// A unique label is already bound to another task.
    #[error("label {label:?} is already held by task {holder}")]
    LabelTaken {
        /// Normalized label.
        label: String,
        /// Task currently holding the label.
        holder: TaskId,
    },

    /// The task is already a member under this label.
    #[error("task {task} is already assigned to {label:?}")]
    AlreadyMember {
        /// Normalized label.
        label: String,
        /// Task that was assigned twice.
        task: TaskId,
    },

    /// No classifier is registered under the name.
    #[error("classifier {name:?} not found")]
    NotFound {
        /// Requested classifier name.
        name: String,
    },

    /// Registration used a name that is already taken.
    #[error("classifier name {name:?} is already registered")]
    NameTaken {
        /// Colliding name.
        name: String,
    },

    /// The caller's context was cancelled while waiting for a free slot.
    #[error("waiting for a free slot was cancelled")]
    Canceled,

    /// No slot became free before the classifier's own timeout.
    #[error("no free slot in {label:?} after {timeout:?}")]
    Timeout {
        /// Label of the limited group.
        label: String,
        /// Configured wait timeout.
        timeout: Duration,
    },
}

impl ClassifierError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClassifierError::EmptyLabel => "classifier_empty_label",
            ClassifierError::InvalidOptions { .. } => "classifier_invalid_options",
            ClassifierError::LabelTaken { .. } => "classifier_label_taken",
            ClassifierError::AlreadyMember { .. } => "classifier_already_member",
            ClassifierError::NotFound { .. } => "classifier_not_found",
            ClassifierError::NameTaken { .. } => "classifier_name_taken",
            ClassifierError::Canceled => "classifier_canceled",
            ClassifierError::Timeout { .. } => "classifier_timeout",
        }
    }
}

/// A running task already holds a conflicting lock on one of the targets.
///
/// Carries the conflicting task's kind and full target map so callers can
/// translate it into a domain message ("locked by an in-progress migration").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("conflicts with running {kind} task {id} holding [{targets}]")]
pub struct ConcurrentRunningError {
    /// Identifier of the running task.
    pub id: TaskId,
    /// Kind tag of the running task.
    pub kind: &'static str,
    /// Targets declared by the running task.
    pub targets: Targets,
}

/// # Errors returned by [`Pool`](crate::Pool) operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was drained and closed; no new tasks are admitted.
    #[error("pool closed")]
    Closed,

    /// A running task holds a conflicting lock.
    #[error(transparent)]
    Conflict(#[from] ConcurrentRunningError),

    /// A classifier assignment failed.
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),

    /// The caller's context was cancelled during admission.
    #[error("start cancelled by caller")]
    Canceled,

    /// `before_start` rejected the task.
    #[error("before start: {0}")]
    Precondition(TaskError),

    /// No task with this id is known (never started or already evicted).
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The task has already been released.
    #[error("task {0} is not running")]
    NotRunning(TaskId),
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskpool::PoolError;
    ///
    /// assert_eq!(PoolError::Closed.as_label(), "pool_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::Closed => "pool_closed",
            PoolError::Conflict(_) => "pool_conflict",
            PoolError::Classifier(e) => e.as_label(),
            PoolError::Canceled => "pool_start_canceled",
            PoolError::Precondition(_) => "pool_precondition",
            PoolError::NotFound(_) => "pool_task_not_found",
            PoolError::NotRunning(_) => "pool_task_not_running",
        }
    }

    /// Returns the conflict details if this is [`PoolError::Conflict`].
    pub fn as_conflict(&self) -> Option<&ConcurrentRunningError> {
        match self {
            PoolError::Conflict(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::OperationMode;

    #[test]
    fn conflict_message_names_kind_and_targets() {
        let err = ConcurrentRunningError {
            id: TaskId::new(),
            kind: "migration",
            targets: Targets::new().with("vm1", OperationMode::BLOCK_ALL),
        };
        let msg = PoolError::from(err).to_string();
        assert!(msg.contains("migration"));
        assert!(msg.contains("vm1=BlockAll"));
    }

    #[test]
    fn classifier_labels_pass_through_pool_error() {
        let err = PoolError::from(ClassifierError::EmptyLabel);
        assert_eq!(err.as_label(), "classifier_empty_label");
    }

    #[test]
    fn canceled_is_distinguished() {
        assert!(TaskError::Canceled.is_canceled());
        assert!(!TaskError::fail("io").is_canceled());
    }
}
