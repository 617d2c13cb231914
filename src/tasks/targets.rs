//! # Resource targets and access modes.
//!
//! A task declares the resources it touches as [`Targets`]: a map from an
//! opaque resource key (a VM name, or `vmname:subresource`) to an
//! [`OperationMode`] bitmask.
//!
//! ## Conflict rule
//! Two tasks conflict on a key when the bitwise AND of their modes for that
//! key is non-zero. Independent lock "dimensions" can therefore coexist:
//! ```text
//! running: {"vm1": BLOCK_BACKUP}
//! new:     {"vm1": BLOCK_CONF}    → admitted (no shared bit)
//! new:     {"vm1": BLOCK_ALL}     → rejected (BLOCK_ALL overlaps everything)
//! new:     {"vm2": BLOCK_ALL}     → admitted (disjoint keys)
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Access-mode bitmask declared per target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationMode(u32);

impl OperationMode {
    /// Never conflicts.
    pub const NO_BLOCK: Self = Self(0);
    /// Configuration-mutation lock.
    pub const BLOCK_CONF: Self = Self(1 << 0);
    /// Backup lock.
    pub const BLOCK_BACKUP: Self = Self(1 << 1);
    /// Exclusive: every bit set.
    pub const BLOCK_ALL: Self = Self(u32::MAX);

    /// Builds a mode from raw bits.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if the two modes share at least one bit.
    #[inline]
    pub const fn overlaps(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` unless this is [`OperationMode::NO_BLOCK`].
    #[inline]
    pub const fn is_blocking(self) -> bool {
        self.0 != 0
    }
}

impl BitOr for OperationMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OperationMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for OperationMode {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NO_BLOCK => f.write_str("NoBlock"),
            Self::BLOCK_ALL => f.write_str("BlockAll"),
            Self::BLOCK_CONF => f.write_str("BlockConf"),
            Self::BLOCK_BACKUP => f.write_str("BlockBackup"),
            Self(bits) => write!(f, "{bits:#x}"),
        }
    }
}

/// Resource key → access mode map declared by a task.
///
/// Keys are kept ordered so snapshots and error messages are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Targets(BTreeMap<String, OperationMode>);

impl Targets {
    /// Creates an empty target set (never conflicts).
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds `mode` for `key`, OR-ing with any mode already declared for it.
    pub fn with(mut self, key: impl Into<String>, mode: OperationMode) -> Self {
        self.insert(key, mode);
        self
    }

    /// Adds `mode` for `key`, OR-ing with any mode already declared for it.
    pub fn insert(&mut self, key: impl Into<String>, mode: OperationMode) {
        *self.0.entry(key.into()).or_default() |= mode;
    }

    /// Returns the mode declared for `key`.
    pub fn get(&self, key: &str) -> Option<OperationMode> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, OperationMode> {
        self.0.iter()
    }

    /// Returns the first shared key whose modes overlap, if any.
    pub fn conflicts_with<'a>(&'a self, other: &'a Targets) -> Option<&'a str> {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .iter()
            .find(|(key, mode)| large.get(key).is_some_and(|m| m.overlaps(**mode)))
            .map(|(key, _)| key.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, OperationMode)> for Targets {
    fn from_iter<I: IntoIterator<Item = (K, OperationMode)>>(iter: I) -> Self {
        let mut targets = Targets::new();
        for (key, mode) in iter {
            targets.insert(key, mode);
        }
        targets
    }
}

impl<'a> IntoIterator for &'a Targets {
    type Item = (&'a String, &'a OperationMode);
    type IntoIter = btree_map::Iter<'a, String, OperationMode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Targets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, mode)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={mode}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_all_overlaps_every_blocking_mode() {
        assert!(OperationMode::BLOCK_ALL.overlaps(OperationMode::BLOCK_CONF));
        assert!(OperationMode::BLOCK_ALL.overlaps(OperationMode::BLOCK_BACKUP));
        assert!(!OperationMode::BLOCK_ALL.overlaps(OperationMode::NO_BLOCK));
    }

    #[test]
    fn independent_dimensions_do_not_overlap() {
        assert!(!OperationMode::BLOCK_CONF.overlaps(OperationMode::BLOCK_BACKUP));
    }

    #[test]
    fn same_key_overlapping_bits_conflict() {
        let running = Targets::new().with("vm1", OperationMode::BLOCK_ALL);
        let new = Targets::new().with("vm1", OperationMode::BLOCK_CONF);
        assert_eq!(running.conflicts_with(&new), Some("vm1"));
        assert_eq!(new.conflicts_with(&running), Some("vm1"));
    }

    #[test]
    fn disjoint_keys_never_conflict() {
        let a = Targets::new().with("vm1", OperationMode::BLOCK_ALL);
        let b = Targets::new().with("vm2", OperationMode::BLOCK_ALL);
        assert_eq!(a.conflicts_with(&b), None);
    }

    #[test]
    fn backup_and_conf_share_a_vm() {
        let backup = Targets::new()
            .with("vm1", OperationMode::BLOCK_BACKUP)
            .with("vm1:disk0", OperationMode::BLOCK_ALL);
        let reconfigure = Targets::new().with("vm1", OperationMode::BLOCK_CONF);
        assert_eq!(backup.conflicts_with(&reconfigure), None);
    }

    #[test]
    fn insert_ors_modes_for_same_key() {
        let t = Targets::new()
            .with("vm1", OperationMode::BLOCK_CONF)
            .with("vm1", OperationMode::BLOCK_BACKUP);
        assert_eq!(
            t.get("vm1"),
            Some(OperationMode::BLOCK_CONF | OperationMode::BLOCK_BACKUP)
        );
    }

    #[test]
    fn display_is_ordered() {
        let t: Targets = [
            ("vm2", OperationMode::BLOCK_CONF),
            ("vm1", OperationMode::BLOCK_ALL),
        ]
        .into_iter()
        .collect();
        assert_eq!(t.to_string(), "vm1=BlockAll, vm2=BlockConf");
    }
}
