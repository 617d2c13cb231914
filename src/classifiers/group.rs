//! # Group-label classifier (1:N)
//!
//! Any number of tasks may share a label. Used to answer "which tasks are
//! running for this VM" (`"<vmname>/long-running"`) and to cancel them as a
//! group through [`Pool::cancel_by_label`](crate::Pool::cancel_by_label).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::classifiers::{Classifier, ClassifierOptions, normalize_label};
use crate::error::ClassifierError;
use crate::sync::lock;
use crate::tasks::TaskId;

/// Label → set of task ids.
#[derive(Default)]
pub struct GroupLabel {
    groups: Mutex<HashMap<String, HashSet<TaskId>>>,
}

impl GroupLabel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Classifier for GroupLabel {
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

        let mut groups = lock(&self.groups);
        let members = groups.entry(label.clone()).or_default();
        if !members.insert(task) {
            return Err(ClassifierError::AlreadyMember { label, task });
        }
        Ok(())
    }

    fn unassign(&self, task: TaskId) {
        let mut groups = lock(&self.groups);
        groups.retain(|_, members| {
            members.remove(&task);
            !members.is_empty()
        });
    }

    /// Union of all members across `labels`, ordered by id.
    fn get(&self, labels: &[&str]) -> Vec<TaskId> {
        let groups = lock(&self.groups);
        let union: BTreeSet<TaskId> = labels
            .iter()
            .filter_map(|label| groups.get(&normalize_label(label)))
            .flatten()
            .copied()
            .collect();
        union.into_iter().collect()
    }

    /// Number of non-empty groups.
    fn len(&self) -> usize {
        lock(&self.groups).len()
    }

    fn name(&self) -> &'static str {
        "group"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::LabelOptions;

    async fn assign(c: &GroupLabel, task: TaskId, label: &str) -> Result<(), ClassifierError> {
        c.assign(&CancellationToken::new(), task, &LabelOptions::new(label))
            .await
    }

    #[tokio::test]
    async fn all_members_are_returned() {
        let c = GroupLabel::new();
        let ids: Vec<TaskId> = (0..5).map(|_| TaskId::new()).collect();
        for id in &ids {
            assign(&c, *id, "vm1/long-running").await.unwrap();
        }

        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(c.get(&["vm1/long-running"]), expected);
    }

    #[tokio::test]
    async fn removing_one_member_leaves_the_rest() {
        let c = GroupLabel::new();
        let ids: Vec<TaskId> = (0..3).map(|_| TaskId::new()).collect();
        for id in &ids {
            assign(&c, *id, "grp").await.unwrap();
        }

        c.unassign(ids[1]);
        let left = c.get(&["grp"]);
        assert_eq!(left.len(), 2);
        assert!(left.contains(&ids[0]));
        assert!(left.contains(&ids[2]));
        assert!(!left.contains(&ids[1]));
    }

    #[tokio::test]
    async fn same_task_twice_under_one_label_fails() {
        let c = GroupLabel::new();
        let id = TaskId::new();
        assign(&c, id, "grp").await.unwrap();
        assert_eq!(
            assign(&c, id, "GRP").await,
            Err(ClassifierError::AlreadyMember {
                label: "grp".into(),
                task: id
            })
        );
        // The same task may join another group.
        assign(&c, id, "other").await.unwrap();
    }

    #[tokio::test]
    async fn empty_groups_are_dropped() {
        let c = GroupLabel::new();
        let id = TaskId::new();
        assign(&c, id, "a").await.unwrap();
        assign(&c, id, "b").await.unwrap();
        assert_eq!(c.len(), 2);

        c.unassign(id);
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn get_unions_across_labels() {
        let c = GroupLabel::new();
        let (a, b, shared) = (TaskId::new(), TaskId::new(), TaskId::new());
        assign(&c, a, "x").await.unwrap();
        assign(&c, b, "y").await.unwrap();
        assign(&c, shared, "x").await.unwrap();
        assign(&c, shared, "y").await.unwrap();

        let got = c.get(&["x", "y"]);
        assert_eq!(got.len(), 3);
    }
}
