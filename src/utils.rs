//! Utility functions for envtrace
//!
//! Hashing helpers, path normalization, atomic file writes and project-root
//! discovery shared by the store, the reference manager and the restore engine.
//!
//! ## Example Usage
//!
//! ```rust
//! use envtrace::utils::{clean_path, hash_str, short_hash};
//!
//! let hash = hash_str("VALUE");
//! assert_eq!(hash.len(), 64);
//! assert_eq!(short_hash(&hash).len(), 7);
//! assert_eq!(clean_path("./config//.env"), "config/.env");
//! ```

use crate::error::{Result, TraceError};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Name of the metadata directory at the project root
pub const TRACE_DIR: &str = ".trace";

/// Markers that identify a project root, in priority order
const ROOT_MARKERS: &[&str] = &[TRACE_DIR, ".git"];

/// Number of characters shown for abbreviated hashes
pub const SHORT_HASH_LEN: usize = 7;

/// Compute the SHA-256 hash of data, hex encoded
///
/// This is the content address used for blobs and the digest used for
/// environment values and commit records.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 hash of a string
pub fn hash_str(s: &str) -> String {
    hash_data(s.as_bytes())
}

/// First seven characters of a hash, or the whole string if shorter
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// Whether a string consists only of hexadecimal digits
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Normalize a tracked path into its canonical key form
///
/// Separators become `/`, empty and `.` components are dropped, and
/// `dir/..` pairs collapse. Leading `..` components are kept so callers can
/// detect paths that escape the project root. An empty result becomes `.`.
pub fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/') || path.starts_with('\\');
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Whether a cleaned path stays inside the directory it is joined onto
pub fn is_contained(path: &str) -> bool {
    let p = Path::new(path);
    !p.is_absolute()
        && !path.starts_with('/')
        && !path.split('/').any(|c| c == "..")
        && path != "."
}

/// Write content to a file atomically
///
/// Writes to a uniquely named temporary file in the destination directory and
/// renames it into place, so readers never observe a partially written file
/// and concurrent writers never share a temp file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| TraceError::Io(e.error))?;

    trace!("Atomically wrote {:?} ({} bytes)", path, content.len());
    Ok(())
}

/// Sibling path used to back up a file before it is overwritten
///
/// The name is `<file>.backup.<unix-seconds>`; when that already exists a
/// `-<n>` counter is appended until a free name is found.
pub fn backup_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let mut base = path.as_os_str().to_owned();
    base.push(format!(".backup.{}", now.timestamp()));
    let candidate = PathBuf::from(&base);
    if !candidate.exists() {
        return candidate;
    }

    let mut n = 1u32;
    loop {
        let mut name = base.clone();
        name.push(format!("-{}", n));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Find the project root by walking upward from `start`
///
/// A directory containing `.trace` wins; failing that, the nearest directory
/// containing `.git` is used.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    for marker in ROOT_MARKERS {
        let mut dir = Some(start);
        while let Some(current) = dir {
            if current.join(marker).exists() {
                return Ok(current.to_path_buf());
            }
            dir = current.parent();
        }
    }
    Err(TraceError::ProjectRootNotFound(start.to_path_buf()))
}
