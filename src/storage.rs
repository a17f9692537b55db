//! Content-addressable object store
//!
//! Blobs and commits live under the repository's `.trace` directory, each
//! addressed by its SHA-256 hash:
//!
//! ```text
//! .trace/
//! └── objects/
//!     ├── blobs/
//!     │   └── <hash>          # raw file content
//!     └── commits/
//!         └── <hash>.json     # commit record
//! ```
//!
//! Writes are write-once. An object whose address already exists is never
//! rewritten, and new objects are written through a temp file that is only
//! moved into place if the destination is still free, so two processes storing
//! the same content cannot corrupt each other.
//!
//! Partial-hash lookups go through an in-memory sorted index of commit hashes,
//! built on first use and kept current as commits are saved.
//!
//! ## Example Usage
//!
//! ```rust
//! use envtrace::storage::ObjectStore;
//! use tempfile::TempDir;
//!
//! # fn example() -> envtrace::Result<()> {
//! let temp_dir = TempDir::new()?;
//! let store = ObjectStore::init(temp_dir.path().join(".trace"))?;
//!
//! let hash = store.save_blob(b"KEY=VALUE\n")?;
//! assert_eq!(store.load_blob(&hash)?, b"KEY=VALUE\n");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::commit::Commit;
use crate::error::{ObjectKind, Result, TraceError};
use crate::refs::{is_valid_branch_name, RefManager};
use crate::utils::{hash_data, is_hex, short_hash};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Shortest hex prefix accepted for partial-hash resolution
pub const MIN_PREFIX_LEN: usize = 4;

/// Literal reference naming the current HEAD commit
pub const HEAD_REF: &str = "HEAD";

const BLOBS_DIR: &str = "objects/blobs";
const COMMITS_DIR: &str = "objects/commits";

/// Content-addressable storage for blobs and commits
pub struct ObjectStore {
    /// The `.trace` directory
    root: PathBuf,
    /// Sorted commit hashes, loaded lazily
    commit_index: RwLock<Option<Vec<String>>>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("root", &self.root)
            .field(
                "indexed_commits",
                &self.commit_index.read().as_ref().map(Vec::len),
            )
            .finish()
    }
}

impl ObjectStore {
    /// Create the object directories under `root` and open the store
    ///
    /// Existing directories are left as they are.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(BLOBS_DIR))?;
        fs::create_dir_all(root.join(COMMITS_DIR))?;

        info!("Initialized object store at {:?}", root);
        Ok(Self::at(root))
    }

    /// Open an existing store
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotInitialized`] if `root` does not exist
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(TraceError::NotInitialized(root));
        }

        debug!("Opened object store at {:?}", root);
        Ok(Self::at(root))
    }

    fn at(root: PathBuf) -> Self {
        Self {
            root,
            commit_index: RwLock::new(None),
        }
    }

    /// The `.trace` directory this store lives in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store raw content, returning its hash
    ///
    /// Saving content that is already present performs no write and returns
    /// the same hash.
    pub fn save_blob(&self, content: &[u8]) -> Result<String> {
        let hash = hash_data(content);
        let path = self.blob_path(&hash);

        if path.exists() {
            trace!("Blob {} already stored", short_hash(&hash));
            return Ok(hash);
        }

        write_once(&path, content)?;
        trace!("Stored blob {} ({} bytes)", short_hash(&hash), content.len());
        Ok(hash)
    }

    /// Load blob content by hash
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotFound`] if no blob exists at that address
    pub fn load_blob(&self, hash: &str) -> Result<Vec<u8>> {
        if !is_hex(hash) {
            return Err(TraceError::not_found(ObjectKind::Blob, hash));
        }

        match fs::read(self.blob_path(hash)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TraceError::not_found(ObjectKind::Blob, hash))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a blob is stored
    pub fn blob_exists(&self, hash: &str) -> bool {
        is_hex(hash) && self.blob_path(hash).is_file()
    }

    /// Re-hash a stored blob and compare it with its address
    pub fn verify_blob(&self, hash: &str) -> Result<()> {
        let content = self.load_blob(hash)?;
        let actual = hash_data(&content);
        if actual != hash {
            return Err(TraceError::CorruptObject {
                expected: hash.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Persist a commit under its own hash
    ///
    /// Re-saving a commit that is already stored is a no-op.
    pub fn save_commit(&self, commit: &Commit) -> Result<()> {
        let path = self.commit_path(&commit.hash);

        if path.exists() {
            trace!("Commit {} already stored", commit.short_hash());
        } else {
            let json = serde_json::to_vec_pretty(commit)?;
            write_once(&path, &json)?;
            debug!("Stored commit {}", commit.short_hash());
        }

        if let Some(index) = self.commit_index.write().as_mut() {
            if let Err(pos) = index.binary_search(&commit.hash) {
                index.insert(pos, commit.hash.clone());
            }
        }
        Ok(())
    }

    /// Load a commit by its full hash
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotFound`] if the commit does not exist
    /// - [`TraceError::Parse`] if the stored record is malformed
    pub fn load_commit(&self, hash: &str) -> Result<Commit> {
        if !is_hex(hash) {
            return Err(TraceError::not_found(ObjectKind::Commit, hash));
        }

        let bytes = match fs::read(self.commit_path(hash)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TraceError::not_found(ObjectKind::Commit, hash));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| TraceError::parse(format!("commit {}", hash), e))
    }

    /// Check whether a commit with this full hash is stored
    pub fn commit_exists(&self, hash: &str) -> bool {
        is_hex(hash) && self.commit_path(hash).is_file()
    }

    /// All stored commit hashes, sorted
    pub fn list_commits(&self) -> Result<Vec<String>> {
        self.ensure_index()?;
        Ok(self.commit_index.read().clone().unwrap_or_default())
    }

    /// Commit hashes beginning with `prefix`, sorted
    pub fn commits_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.ensure_index()?;
        let guard = self.commit_index.read();
        let index = guard.as_deref().unwrap_or_default();

        let start = index.partition_point(|h| h.as_str() < prefix);
        Ok(index[start..]
            .iter()
            .take_while(|h| h.starts_with(prefix))
            .cloned()
            .collect())
    }

    /// Resolve a reference string to a commit hash
    ///
    /// Tried in order:
    /// 1. an exact stored commit hash
    /// 2. a branch name that points at a commit
    /// 3. the literal `HEAD`
    /// 4. a unique hex prefix of at least [`MIN_PREFIX_LEN`] characters
    ///
    /// # Errors
    ///
    /// - [`TraceError::InvalidReference`] for empty references or ones containing
    ///   whitespace or `..`
    /// - [`TraceError::NoCommitsYet`] for `HEAD` in an empty repository
    /// - [`TraceError::Ambiguous`] if the prefix matches several commits
    /// - [`TraceError::NotFound`] if nothing matches
    pub fn resolve_ref(&self, refs: &RefManager, reference: &str) -> Result<String> {
        if reference.is_empty() {
            return Err(TraceError::invalid_reference("empty reference"));
        }
        if reference.chars().any(char::is_whitespace) || reference.contains("..") {
            return Err(TraceError::invalid_reference(reference));
        }

        if self.commit_exists(reference) {
            return Ok(reference.to_string());
        }

        if is_valid_branch_name(reference) {
            if let Some(target) = refs.branch_target(reference)? {
                trace!("Resolved branch {} to {}", reference, short_hash(&target));
                return Ok(target);
            }
        }

        if reference == HEAD_REF {
            return refs.get_head()?.ok_or(TraceError::NoCommitsYet);
        }

        if reference.len() >= MIN_PREFIX_LEN && is_hex(reference) {
            let prefix = reference.to_ascii_lowercase();
            let mut matches = self.commits_with_prefix(&prefix)?;
            if matches.len() < 2 {
                // Other handles may have stored commits since the index was built.
                self.refresh_index()?;
                matches = self.commits_with_prefix(&prefix)?;
            }
            match matches.len() {
                0 => {}
                1 => return Ok(matches.remove(0)),
                _ => {
                    return Err(TraceError::Ambiguous {
                        reference: reference.to_string(),
                        candidates: matches,
                    })
                }
            }
        }

        Err(TraceError::not_found(ObjectKind::Reference, reference))
    }

    /// Walk parent links from `start`, most recent first
    ///
    /// Fails with the error of the first link that cannot be loaded.
    pub fn commit_history(&self, start: &str) -> Result<Vec<Commit>> {
        let mut history = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(start.to_string());

        while let Some(hash) = current {
            if !seen.insert(hash.clone()) {
                warn!("Parent cycle detected at {}", short_hash(&hash));
                return Err(TraceError::CorruptObject {
                    expected: hash,
                    actual: "parent cycle".to_string(),
                });
            }

            let commit = self.load_commit(&hash)?;
            current = commit.parent.clone();
            history.push(commit);
        }

        Ok(history)
    }

    fn ensure_index(&self) -> Result<()> {
        if self.commit_index.read().is_some() {
            return Ok(());
        }

        let hashes = self.scan_commits()?;
        debug!("Indexed {} commits", hashes.len());
        let mut guard = self.commit_index.write();
        if guard.is_none() {
            *guard = Some(hashes);
        }
        Ok(())
    }

    fn refresh_index(&self) -> Result<()> {
        let hashes = self.scan_commits()?;
        trace!("Rescanned {} commits", hashes.len());
        *self.commit_index.write() = Some(hashes);
        Ok(())
    }

    fn scan_commits(&self) -> Result<Vec<String>> {
        let dir = self.root.join(COMMITS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut hashes = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(hash) = name.strip_suffix(".json") {
                if is_hex(hash) {
                    hashes.push(hash.to_string());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join(BLOBS_DIR).join(hash)
    }

    fn commit_path(&self, hash: &str) -> PathBuf {
        self.root.join(COMMITS_DIR).join(format!("{}.json", hash))
    }
}

/// Write `content` to `path` unless something is already there
fn write_once(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) => parent,
        None => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    match temp.persist_noclobber(path) {
        Ok(_) => Ok(()),
        // Another writer stored the same object first.
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(TraceError::Io(e.error)),
    }
}
