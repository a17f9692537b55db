//! Key/hash map comparison
//!
//! Snapshots hold two sparse maps from name to hash. Comparing an old map
//! with a new one sorts every key into one of three sets:
//!
//! - **added**: only in the new map
//! - **removed**: only in the old map
//! - **changed**: in both, with different hashes
//!
//! Keys present in both with equal hashes are unchanged and omitted. The same
//! algorithm backs [`EnvDiff`] and [`FileDiff`]; only the field names differ
//! (`changed` for environment keys, `modified` for files).
//!
//! Result sets are `BTreeSet`s, so iteration is always in key order.
//!
//! ## Examples
//!
//! ```rust
//! use envtrace::diff::compare_map;
//! use std::collections::BTreeMap;
//!
//! let old = BTreeMap::from([("A".to_string(), "1".to_string())]);
//! let new = BTreeMap::from([("B".to_string(), "2".to_string())]);
//!
//! let diff = compare_map(&old, &new);
//! assert!(diff.added.contains("B"));
//! assert!(diff.removed.contains("A"));
//! assert!(compare_map(&old, &old).is_empty());
//! ```

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Generic three-way result of comparing two key to hash maps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDiff {
    /// Keys only in the new map
    pub added: BTreeSet<String>,
    /// Keys only in the old map
    pub removed: BTreeSet<String>,
    /// Keys in both maps with different hashes
    pub changed: BTreeSet<String>,
}

impl MapDiff {
    /// True when all three sets are empty
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of differing keys
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Compare `old` against `new`
pub fn compare_map(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> MapDiff {
    let mut diff = MapDiff::default();

    for (key, new_hash) in new {
        match old.get(key) {
            None => {
                diff.added.insert(key.clone());
            }
            Some(old_hash) if old_hash != new_hash => {
                diff.changed.insert(key.clone());
            }
            Some(_) => {}
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            diff.removed.insert(key.clone());
        }
    }

    diff
}

/// Differences between two sets of environment keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDiff {
    /// Newly defined keys
    pub added: BTreeSet<String>,
    /// Keys no longer defined
    pub removed: BTreeSet<String>,
    /// Keys whose value hash differs
    pub changed: BTreeSet<String>,
}

impl EnvDiff {
    /// True when no key differs
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl From<MapDiff> for EnvDiff {
    fn from(diff: MapDiff) -> Self {
        Self {
            added: diff.added,
            removed: diff.removed,
            changed: diff.changed,
        }
    }
}

/// Differences between two sets of tracked files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Paths newly present
    pub added: BTreeSet<String>,
    /// Paths no longer present
    pub removed: BTreeSet<String>,
    /// Paths whose content hash differs
    pub modified: BTreeSet<String>,
}

impl FileDiff {
    /// True when no path differs
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

impl From<MapDiff> for FileDiff {
    fn from(diff: MapDiff) -> Self {
        Self {
            added: diff.added,
            removed: diff.removed,
            modified: diff.changed,
        }
    }
}

/// Environment and file differences between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    /// Environment key changes
    pub env: EnvDiff,
    /// Tracked file changes
    pub files: FileDiff,
}

impl Drift {
    /// True when neither keys nor files differ
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.files.is_empty()
    }
}

/// Compare an older snapshot with a newer one
pub fn compare_snapshots(old: &Snapshot, new: &Snapshot) -> Drift {
    Drift {
        env: compare_map(&old.env_keys, &new.env_keys).into(),
        files: compare_map(&old.files, &new.files).into(),
    }
}
