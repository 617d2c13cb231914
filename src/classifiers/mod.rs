//! # Classifiers: label-based admission and grouping.
//!
//! - [`UniqueLabel`] at most one task per label (deduplication).
//! - [`GroupLabel`] any number of tasks per label (batch queries, bulk cancel).
//! - [`LimitedGroup`] at most N tasks under one fixed label (concurrency gate).
//! - [`ClassifierRegistry`] named, aliasable collection consulted by the pool.
//!
//! Custom policies implement [`Classifier`] and are registered next to the
//! built-in ones.

mod classifier;
mod group;
mod limited;
mod registry;
mod unique;

pub use classifier::{Assignment, Classifier, ClassifierOptions, LabelOptions, normalize_label};
pub use group::GroupLabel;
pub use limited::{LimitedGroup, LimitedGroupConfig};
pub use registry::ClassifierRegistry;
pub use unique::UniqueLabel;
