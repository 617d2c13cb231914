//! # Classifier contract
//!
//! A classifier is a pluggable admission/grouping policy keyed by string
//! labels. The pool never inspects a classifier's membership directly; it
//! only goes through [`Classifier::assign`], [`Classifier::unassign`] and
//! [`Classifier::get`].
//!
//! A task asks for classification by passing [`Assignment`]s to
//! [`Pool::start_task`](crate::Pool::start_task). Each assignment names a
//! registered classifier and carries polymorphic [`ClassifierOptions`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ClassifierError;
use crate::tasks::TaskId;

/// Options carried by an [`Assignment`].
pub trait ClassifierOptions: Send + Sync + fmt::Debug {
    /// Label the task is classified under (raw; classifiers normalize it).
    fn label(&self) -> &str;

    /// Validates the options before any classifier state is touched.
    fn validate(&self) -> Result<(), ClassifierError>;
}

/// Case-folds and trims a label.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Plain label options used by the unique, group and limited-group classifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelOptions {
    label: String,
}

impl LabelOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ClassifierOptions for LabelOptions {
    fn label(&self) -> &str {
        &self.label
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.label.trim().is_empty() {
            return Err(ClassifierError::EmptyLabel);
        }
        Ok(())
    }
}

/// A `(classifier name, options)` pair passed to `start_task`.
#[derive(Debug, Clone)]
pub struct Assignment {
    name: String,
    options: Arc<dyn ClassifierOptions>,
}

impl Assignment {
    /// Assignment to the classifier registered as `name` with custom options.
    pub fn new(name: impl Into<String>, options: impl ClassifierOptions + 'static) -> Self {
        Self {
            name: name.into(),
            options: Arc::new(options),
        }
    }

    /// Assignment with plain [`LabelOptions`].
    ///
    /// ```
    /// use taskpool::Assignment;
    ///
    /// let a = Assignment::label("unique", "vm1/migration");
    /// assert_eq!(a.name(), "unique");
    /// ```
    pub fn label(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, LabelOptions::new(label))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &dyn ClassifierOptions {
        self.options.as_ref()
    }
}

/// Pluggable grouping / deduplication / rate-limiting policy.
///
/// Implementations own their membership state behind their own lock.
/// `unassign` must be a no-op for unknown task ids, which makes the
/// registry's fan-out idempotent and order-independent.
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    /// Classifies `task` under the options' label.
    ///
    /// May suspend (bounded-concurrency gates); must then honor `ctx`.
    async fn assign(
        &self,
        ctx: &CancellationToken,
        task: TaskId,
        options: &dyn ClassifierOptions,
    ) -> Result<(), ClassifierError>;

    /// Removes every membership of `task`.
    fn unassign(&self, task: TaskId);

    /// Task ids classified under any of `labels`.
    fn get(&self, labels: &[&str]) -> Vec<TaskId>;

    /// Number of entries currently tracked.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable tag of the classifier kind ("unique", "group", ...), used in logs.
    fn name(&self) -> &'static str;
}
