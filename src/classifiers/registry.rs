//! # Root classifier registry.
//!
//! Maps classifier names (plus aliases) to classifier instances. The pool
//! routes every [`Assignment`] through [`ClassifierRegistry::assign`] and
//! releases a finished task with a single [`ClassifierRegistry::unassign`]
//! that fans out to every registered classifier.
//!
//! ## Name resolution
//! ```text
//! register(["unique", "u"], c)   canonical = "unique", alias "u" -> "unique"
//!
//! assign(.., Assignment{"unique"}) ─► c            (canonical only)
//! assign(.., Assignment{"u"})      ─► NotFound
//! get("u", labels)                 ─► NotFound     (canonical only)
//! deregister("u")                  ─► removes c, "unique" and "u"
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::classifiers::{Assignment, Classifier};
use crate::error::ClassifierError;
use crate::sync::{read, write};
use crate::tasks::TaskId;

#[derive(Default)]
struct Entries {
    classifiers: HashMap<String, Arc<dyn Classifier>>,
    aliases: HashMap<String, String>,
}

impl Entries {
    fn is_taken(&self, name: &str) -> bool {
        self.classifiers.contains_key(name) || self.aliases.contains_key(name)
    }

    fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.classifiers.contains_key(name) {
            return Some(name);
        }
        self.aliases.get(name).map(String::as_str)
    }
}

/// Named set of classifiers shared by a [`Pool`](crate::Pool).
#[derive(Default)]
pub struct ClassifierRegistry {
    inner: RwLock<Entries>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `classifier` under `names[0]` with `names[1..]` as aliases.
    ///
    /// Fails with [`ClassifierError::NameTaken`] if any name (canonical or
    /// alias) is already in use; nothing is registered in that case.
    pub fn register(
        &self,
        names: &[&str],
        classifier: Arc<dyn Classifier>,
    ) -> Result<(), ClassifierError> {
        let Some((canonical, aliases)) = names.split_first() else {
            return Err(ClassifierError::InvalidOptions {
                reason: "at least one classifier name is required".into(),
            });
        };

        let mut entries = write(&self.inner);
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(ClassifierError::InvalidOptions {
                    reason: "classifier name must not be empty".into(),
                });
            }
            if entries.is_taken(name) || names[..i].contains(name) {
                return Err(ClassifierError::NameTaken {
                    name: (*name).to_string(),
                });
            }
        }

        debug!(name = canonical, aliases = ?aliases, kind = classifier.name(), "classifier registered");
        entries
            .classifiers
            .insert((*canonical).to_string(), classifier);
        for alias in aliases {
            entries
                .aliases
                .insert((*alias).to_string(), (*canonical).to_string());
        }
        Ok(())
    }

    /// Removes the classifier registered under `name` (canonical or alias),
    /// together with all of its aliases.
    ///
    /// Memberships held by running tasks are dropped with the classifier.
    pub fn deregister(&self, name: &str) -> Result<(), ClassifierError> {
        let mut entries = write(&self.inner);
        let canonical = entries
            .canonical(name)
            .map(str::to_string)
            .ok_or_else(|| ClassifierError::NotFound {
                name: name.to_string(),
            })?;

        entries.classifiers.remove(&canonical);
        entries.aliases.retain(|_, target| *target != canonical);
        debug!(name = %canonical, "classifier deregistered");
        Ok(())
    }

    /// Routes `assignment` to the classifier registered under its canonical name.
    ///
    /// The registry lock is released before the classifier is awaited, so a
    /// blocking limited-group assignment never stalls other registry users.
    pub async fn assign(
        &self,
        ctx: &CancellationToken,
        task: TaskId,
        assignment: &Assignment,
    ) -> Result<(), ClassifierError> {
        let classifier = self.lookup(assignment.name())?;
        trace!(%task, classifier = assignment.name(), label = assignment.options().label(), "assigning");
        classifier.assign(ctx, task, assignment.options()).await
    }

    /// Releases `task` from every registered classifier.
    pub fn unassign(&self, task: TaskId) {
        let classifiers: Vec<_> = read(&self.inner).classifiers.values().cloned().collect();
        for classifier in classifiers {
            classifier.unassign(task);
        }
    }

    /// Task ids classified by `name` under any of `labels`.
    pub fn get(&self, name: &str, labels: &[&str]) -> Result<Vec<TaskId>, ClassifierError> {
        Ok(self.lookup(name)?.get(labels))
    }

    /// Classifier registered under the canonical `name`.
    pub fn classifier(&self, name: &str) -> Option<Arc<dyn Classifier>> {
        self.lookup(name).ok()
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = read(&self.inner).classifiers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        read(&self.inner).classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Classifier>, ClassifierError> {
        read(&self.inner)
            .classifiers
            .get(name)
            .cloned()
            .ok_or_else(|| ClassifierError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::{GroupLabel, UniqueLabel};

    fn registry() -> ClassifierRegistry {
        let r = ClassifierRegistry::new();
        r.register(&["unique", "u"], Arc::new(UniqueLabel::new()))
            .unwrap();
        r.register(&["group"], Arc::new(GroupLabel::new())).unwrap();
        r
    }

    #[test]
    fn duplicate_names_are_rejected_atomically() {
        let r = registry();
        let err = r
            .register(&["fresh", "u"], Arc::new(GroupLabel::new()))
            .unwrap_err();
        assert_eq!(err, ClassifierError::NameTaken { name: "u".into() });
        assert_eq!(r.names(), vec!["group".to_string(), "unique".to_string()]);
    }

    #[test]
    fn empty_name_list_is_invalid() {
        let r = ClassifierRegistry::new();
        assert!(matches!(
            r.register(&[], Arc::new(GroupLabel::new())),
            Err(ClassifierError::InvalidOptions { .. })
        ));
    }

    #[tokio::test]
    async fn assign_routes_by_canonical_name() {
        let r = registry();
        let ctx = CancellationToken::new();
        let id = TaskId::new();
        r.assign(&ctx, id, &Assignment::label("unique", "vm1"))
            .await
            .unwrap();
        assert_eq!(r.get("unique", &["VM1"]).unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn aliases_are_not_resolved_by_assign_or_get() {
        let r = registry();
        let err = r
            .assign(
                &CancellationToken::new(),
                TaskId::new(),
                &Assignment::label("u", "vm1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ClassifierError::NotFound { name: "u".into() });
        assert!(r.get("u", &["vm1"]).is_err());
    }

    #[tokio::test]
    async fn unassign_fans_out_to_every_classifier() {
        let r = registry();
        let ctx = CancellationToken::new();
        let id = TaskId::new();
        r.assign(&ctx, id, &Assignment::label("unique", "vm1"))
            .await
            .unwrap();
        r.assign(&ctx, id, &Assignment::label("group", "nightly"))
            .await
            .unwrap();

        r.unassign(id);
        r.unassign(id);
        assert!(r.get("unique", &["vm1"]).unwrap().is_empty());
        assert!(r.get("group", &["nightly"]).unwrap().is_empty());
    }

    #[test]
    fn deregister_by_alias_removes_canonical_and_aliases() {
        let r = registry();
        r.deregister("u").unwrap();
        assert_eq!(r.names(), vec!["group".to_string()]);
        assert!(r.classifier("unique").is_none());

        r.register(&["u"], Arc::new(UniqueLabel::new())).unwrap();
        assert!(r.deregister("missing").is_err());
    }
}
