//! Snapshot capture
//!
//! A [`Snapshot`] records, for one moment in time, the content hash of every
//! tracked file and the hash of every environment variable defined in the
//! tracked `.env`-style files. Values are never kept in cleartext; only their
//! SHA-256 digests end up in the snapshot.
//!
//! Capture reads the working directory and writes file contents into the
//! object store as blobs. It never modifies working files.
//!
//! ## Examples
//!
//! ```rust
//! use envtrace::snapshot::{is_env_file, parse_env};
//!
//! assert!(is_env_file(".env"));
//! assert!(is_env_file("config/.env.local"));
//! assert!(!is_env_file("settings.toml"));
//!
//! let keys = parse_env("# comment\nKEY = value\n\nOTHER=x");
//! assert_eq!(keys.len(), 2);
//! ```

use crate::error::Result;
use crate::ignore::PathFilter;
use crate::storage::ObjectStore;
use crate::utils::{clean_path, hash_str};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, trace};

/// Captured environment state
///
/// Both maps are keyed by name and valued by hex SHA-256 digest. `BTreeMap`
/// keeps the serialized form sorted, which the commit hash depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Environment variable name to hash of its value
    #[serde(default)]
    pub env_keys: BTreeMap<String, String>,
    /// Tracked path (root-relative, `/`-separated) to blob hash
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.env_keys.is_empty() && self.files.is_empty()
    }

    /// Capture the current state of `tracked` paths under `root`
    ///
    /// Paths that are ignored by `filter` or do not exist are left out. Every
    /// file that does exist is stored as a blob; files recognised by
    /// [`is_env_file`] are also parsed for their keys. When several env files
    /// define the same key, the one listed later wins.
    ///
    /// Read errors for files that exist are returned to the caller.
    pub fn collect(
        store: &ObjectStore,
        root: &Path,
        tracked: &[String],
        filter: &dyn PathFilter,
    ) -> Result<Self> {
        let mut snapshot = Snapshot::new();

        for raw in tracked {
            let path = clean_path(raw);
            if filter.should_ignore(&path) {
                trace!("Ignoring tracked path {}", path);
                continue;
            }

            let full_path = root.join(&path);
            let content = match fs::read(&full_path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    trace!("Tracked path {} does not exist, skipping", path);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let hash = store.save_blob(&content)?;

            if is_env_file(&path) {
                let text = String::from_utf8_lossy(&content);
                snapshot.env_keys.extend(parse_env(&text));
            }

            snapshot.files.insert(path, hash);
        }

        debug!(
            "Captured snapshot: {} files, {} env keys",
            snapshot.files.len(),
            snapshot.env_keys.len()
        );
        Ok(snapshot)
    }
}

/// Whether a path names an environment-definition file
///
/// Matches on the file name alone: `.env`, `prod.env`, `.env.local` and
/// `.env.production` all qualify.
pub fn is_env_file(path: &str) -> bool {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.ends_with(".env") || name.contains(".env.")
}

/// Parse `.env` text into key to value-hash pairs
///
/// Lines are trimmed; blank lines and `#` comments are skipped. The first `=`
/// splits key from value and both sides are trimmed. Lines without `=`, or
/// whose key would be empty, are ignored. Later definitions of a key replace
/// earlier ones.
pub fn parse_env(text: &str) -> BTreeMap<String, String> {
    let mut keys = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        keys.insert(key.to_string(), hash_str(value.trim()));
    }

    keys
}
