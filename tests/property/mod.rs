//! Property-based testing for envtrace
//!
//! Uses proptest to verify invariants of the diff engine, the object store
//! and commit hashing across randomly generated inputs.

use ::envtrace::*;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

/// Maps of env-style keys to hash-like values
fn hash_map_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[A-Z_]{1,8}", "[0-9a-f]{4}", 0..12)
}

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (
        hash_map_strategy(),
        prop::collection::btree_map("[a-z]{1,6}(/[a-z]{1,6})?\\.env", "[0-9a-f]{4}", 0..6),
    )
        .prop_map(|(env_keys, files)| Snapshot { env_keys, files })
}

proptest! {
    #[test]
    fn prop_diff_with_self_is_empty(map in hash_map_strategy()) {
        let diff = compare_map(&map, &map);
        prop_assert!(diff.is_empty());
    }

    #[test]
    fn prop_diff_is_antisymmetric(a in hash_map_strategy(), b in hash_map_strategy()) {
        let forward = compare_map(&a, &b);
        let backward = compare_map(&b, &a);

        prop_assert_eq!(&forward.added, &backward.removed);
        prop_assert_eq!(&forward.removed, &backward.added);
        prop_assert_eq!(&forward.changed, &backward.changed);
    }

    #[test]
    fn prop_diff_partitions_keys(a in hash_map_strategy(), b in hash_map_strategy()) {
        let diff = compare_map(&a, &b);

        for key in &diff.added {
            prop_assert!(!a.contains_key(key) && b.contains_key(key));
        }
        for key in &diff.removed {
            prop_assert!(a.contains_key(key) && !b.contains_key(key));
        }
        for key in &diff.changed {
            prop_assert_ne!(&a[key], &b[key]);
        }
        for (key, value) in &a {
            if b.get(key) == Some(value) {
                prop_assert!(!diff.changed.contains(key));
            }
        }
        prop_assert!(diff.added.is_disjoint(&diff.removed));
        prop_assert!(diff.changed.is_disjoint(&diff.added));
    }

    #[test]
    fn prop_snapshot_drift_with_self_is_empty(snapshot in snapshot_strategy()) {
        prop_assert!(compare_snapshots(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn prop_blob_round_trip(content in prop::collection::vec(any::<u8>(), 0..2048)) {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::init(temp_dir.path().join(".trace")).unwrap();

        let hash = store.save_blob(&content).unwrap();
        prop_assert_eq!(&hash, &utils::hash_data(&content));
        prop_assert_eq!(store.load_blob(&hash).unwrap(), content.clone());

        // Saving again returns the same address and keeps one object
        prop_assert_eq!(store.save_blob(&content).unwrap(), hash.clone());
        prop_assert!(store.verify_blob(&hash).is_ok());
    }

    #[test]
    fn prop_commit_hash_is_deterministic(
        snapshot in snapshot_strategy(),
        message in "[a-zA-Z0-9 ]{1,40}",
        secs in 0i64..4_000_000_000,
    ) {
        let timestamp = Utc.timestamp_opt(secs, 0).unwrap();
        let a = Commit::with_timestamp(None, timestamp, &message, snapshot.clone());
        let b = Commit::with_timestamp(None, timestamp, &message, snapshot);

        prop_assert_eq!(&a.hash, &b.hash);
        prop_assert_eq!(a.hash.len(), 64);
        prop_assert!(a.verify_integrity());
    }

    #[test]
    fn prop_commit_hash_depends_on_parent(
        snapshot in snapshot_strategy(),
        parent in "[0-9a-f]{64}",
    ) {
        let timestamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let root = Commit::with_timestamp(None, timestamp, "m", snapshot.clone());
        let child = Commit::with_timestamp(Some(parent), timestamp, "m", snapshot);

        prop_assert_ne!(root.hash, child.hash);
    }

    #[test]
    fn prop_stored_commit_survives_reload(snapshot in snapshot_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::init(temp_dir.path().join(".trace")).unwrap();
        let commit = Commit::new(None, "stored", snapshot);

        store.save_commit(&commit).unwrap();
        let loaded = store.load_commit(&commit.hash).unwrap();
        prop_assert_eq!(&loaded, &commit);
        prop_assert!(loaded.verify_integrity());
    }

    #[test]
    fn prop_clean_path_is_idempotent(parts in prop::collection::vec("[a-z]{1,4}|\\.|\\.\\.", 0..8)) {
        let path = parts.join("/");
        let once = utils::clean_path(&path);
        prop_assert_eq!(utils::clean_path(&once), once);
    }

    #[test]
    fn prop_parsed_env_keys_are_trimmed(
        pairs in prop::collection::vec(("[A-Z]{1,6}", "[a-z0-9]{0,6}"), 0..10)
    ) {
        let text: String = pairs
            .iter()
            .map(|(k, v)| format!("  {} = {}  \n", k, v))
            .collect();
        let parsed = snapshot::parse_env(&text);

        for (key, _) in &pairs {
            prop_assert!(parsed.contains_key(key));
            // Later assignments win
            let last = pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v);
            if let Some(last) = last {
                prop_assert_eq!(&parsed[key], &utils::hash_str(last));
            }
        }
    }
}
