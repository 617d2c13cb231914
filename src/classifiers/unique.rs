//! # Unique-label classifier (1:1)
//!
//! Binds each label to at most one task. A second assignment of a bound
//! label fails with [`ClassifierError::LabelTaken`] until the holder is
//! unassigned.
//!
//! Typical use: `"<vmname>/migration"` so only one migration per VM can be in
//! flight, or an interface name so the same link is never reconfigured twice.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::classifiers::{Classifier, ClassifierOptions, normalize_label};
use crate::error::ClassifierError;
use crate::sync::lock;
use crate::tasks::TaskId;

/// Label → single task id.
#[derive(Default)]
pub struct UniqueLabel {
    labels: Mutex<HashMap<String, TaskId>>,
}

impl UniqueLabel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Classifier for UniqueLabel {
    async fn assign(
        &self,
        _ctx: &CancellationToken,
        task: TaskId,
        options: &dyn ClassifierOptions,
    ) -> Result<(), ClassifierError> {
        options.validate()?;
        let label = normalize_label(options.label());
        if label.is_empty() {
            return Err(ClassifierError::EmptyLabel);
        }

        match lock(&self.labels).entry(label) {
            Entry::Occupied(e) => Err(ClassifierError::LabelTaken {
                label: e.key().clone(),
                holder: *e.get(),
            }),
            Entry::Vacant(e) => {
                trace!(label = %e.key(), %task, "unique label bound");
                e.insert(task);
                Ok(())
            }
        }
    }

    fn unassign(&self, task: TaskId) {
        lock(&self.labels).retain(|_, holder| *holder != task);
    }

    fn get(&self, labels: &[&str]) -> Vec<TaskId> {
        let map = lock(&self.labels);
        let mut out: Vec<TaskId> = Vec::with_capacity(labels.len());
        for label in labels {
            if let Some(id) = map.get(&normalize_label(label)) {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
        }
        out
    }

    fn len(&self) -> usize {
        lock(&self.labels).len()
    }

    fn name(&self) -> &'static str {
        "unique"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::LabelOptions;

    #[tokio::test]
    async fn second_assignment_of_same_label_fails() {
        let c = UniqueLabel::new();
        let ctx = CancellationToken::new();
        let (a, b) = (TaskId::new(), TaskId::new());

        c.assign(&ctx, a, &LabelOptions::new("vm1/migration"))
            .await
            .unwrap();
        let err = c
            .assign(&ctx, b, &LabelOptions::new("VM1/Migration "))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClassifierError::LabelTaken {
                label: "vm1/migration".into(),
                holder: a
            }
        );
    }

    #[tokio::test]
    async fn label_is_free_again_after_unassign() {
        let c = UniqueLabel::new();
        let ctx = CancellationToken::new();
        let (a, b) = (TaskId::new(), TaskId::new());

        c.assign(&ctx, a, &LabelOptions::new("eth0")).await.unwrap();
        c.unassign(a);
        assert!(c.is_empty());
        c.assign(&ctx, b, &LabelOptions::new("eth0")).await.unwrap();
        assert_eq!(c.get(&["eth0"]), vec![b]);
    }

    #[tokio::test]
    async fn empty_label_is_rejected() {
        let c = UniqueLabel::new();
        let err = c
            .assign(&CancellationToken::new(), TaskId::new(), &LabelOptions::new(" "))
            .await
            .unwrap_err();
        assert_eq!(err, ClassifierError::EmptyLabel);
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn get_returns_bound_ids_per_label() {
        let c = UniqueLabel::new();
        let ctx = CancellationToken::new();
        let (a, b) = (TaskId::new(), TaskId::new());
        c.assign(&ctx, a, &LabelOptions::new("x")).await.unwrap();
        c.assign(&ctx, b, &LabelOptions::new("y")).await.unwrap();

        assert_eq!(c.get(&["x", "missing", "Y"]), vec![a, b]);
        assert!(c.get(&["missing"]).is_empty());
    }

    #[test]
    fn unassign_unknown_is_noop() {
        let c = UniqueLabel::new();
        c.unassign(TaskId::new());
        assert_eq!(c.len(), 0);
    }
}
