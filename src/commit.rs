//! Commit records
//!
//! A [`Commit`] links a parent commit, a message, a timestamp and a
//! [`Snapshot`]. Its hash is computed once at construction from a canonical
//! serialization of those four fields and doubles as its storage address.
//!
//! ## Canonical form
//!
//! The hash input is compact JSON with a fixed field order and sorted map
//! keys:
//!
//! ```text
//! {"parent":"<hash or empty>","timestamp":"<RFC3339 UTC>","message":"...",
//!  "snapshot":{"env_keys":{...},"files":{...}}}
//! ```
//!
//! ## Examples
//!
//! ```rust
//! use envtrace::commit::Commit;
//! use envtrace::snapshot::Snapshot;
//!
//! let root = Commit::new(None, "first", Snapshot::new());
//! assert!(root.is_root());
//! assert!(root.verify_integrity());
//!
//! let child = Commit::new(Some(root.hash.clone()), "second", Snapshot::new());
//! assert_ne!(root.hash, child.hash);
//! ```

use crate::snapshot::Snapshot;
use crate::utils::{hash_data, short_hash};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An immutable point in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// SHA-256 of the canonical form; identity and address
    pub hash: String,
    /// Parent commit hash (None for the root commit)
    #[serde(default, with = "empty_as_none")]
    pub parent: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// User-supplied message
    pub message: String,
    /// Captured state
    pub snapshot: Snapshot,
}

/// Borrowed view hashed to produce a commit's address
#[derive(Serialize)]
struct CanonicalCommit<'a> {
    parent: &'a str,
    timestamp: String,
    message: &'a str,
    snapshot: &'a Snapshot,
}

impl Commit {
    /// Create a commit stamped with the current time
    pub fn new(parent: Option<String>, message: impl Into<String>, snapshot: Snapshot) -> Self {
        Self::with_timestamp(parent, Utc::now(), message, snapshot)
    }

    /// Create a commit with an explicit timestamp
    ///
    /// Two calls with identical arguments produce identical hashes.
    pub fn with_timestamp(
        parent: Option<String>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
        snapshot: Snapshot,
    ) -> Self {
        let parent = parent.filter(|p| !p.is_empty());
        let message = message.into();
        let hash = compute_hash(parent.as_deref(), &timestamp, &message, &snapshot);

        Self {
            hash,
            parent,
            timestamp,
            message,
            snapshot,
        }
    }

    /// Recompute the hash from the stored fields
    pub fn compute_hash(&self) -> String {
        compute_hash(
            self.parent.as_deref(),
            &self.timestamp,
            &self.message,
            &self.snapshot,
        )
    }

    /// Whether the stored hash still matches the content
    pub fn verify_integrity(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Whether this commit starts the history
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Abbreviated hash for display
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }

    /// One-line summary for logs
    pub fn display_format(&self) -> String {
        format!(
            "[{}] {} ({} files, {} env keys)",
            self.short_hash(),
            self.message,
            self.snapshot.files.len(),
            self.snapshot.env_keys.len()
        )
    }
}

fn compute_hash(
    parent: Option<&str>,
    timestamp: &DateTime<Utc>,
    message: &str,
    snapshot: &Snapshot,
) -> String {
    let canonical = CanonicalCommit {
        parent: parent.unwrap_or(""),
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        message,
        snapshot,
    };
    // Serializing plain strings and string maps cannot fail.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    hash_data(&bytes)
}

/// Reads an empty `parent` string as `None`, for records written with `""`.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(v),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|v| !v.is_empty()))
    }
}
