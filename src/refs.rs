//! HEAD and branch references
//!
//! References are small text files under `.trace`:
//!
//! ```text
//! .trace/
//! ├── HEAD                 # "ref: refs/heads/<branch>\n" or "<hash>\n"
//! └── refs/heads/<branch>  # commit hash, empty for a branch with no commits
//! ```
//!
//! On disk HEAD is text; in memory it is the [`Head`] enum, so code never has
//! to sniff prefixes to tell an attached HEAD from a detached one.
//!
//! Pointer updates are plain file replacements. They are not coordinated
//! across processes: two concurrent commits on one branch race and the last
//! writer wins.

use crate::error::{ObjectKind, Result, TraceError};
use crate::storage::{ObjectStore, HEAD_REF};
use crate::utils::{atomic_write, short_hash};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HEAD_FILE: &str = "HEAD";
const HEADS_DIR: &str = "refs/heads";
const REF_PREFIX: &str = "ref:";
const HEADS_PREFIX: &str = "refs/heads/";

/// Where HEAD currently points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD follows a branch, which may not have commits yet
    Attached(String),
    /// HEAD names a commit directly
    Detached(String),
    /// No HEAD recorded
    Empty,
}

impl Head {
    /// Parse the contents of a HEAD file
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Head::Empty;
        }

        match text.strip_prefix(REF_PREFIX) {
            Some(target) => {
                let target = target.trim();
                let branch = target.strip_prefix(HEADS_PREFIX).unwrap_or(target);
                Head::Attached(branch.to_string())
            }
            None => Head::Detached(text.to_string()),
        }
    }

    /// Text written to the HEAD file
    pub fn to_file_contents(&self) -> String {
        match self {
            Head::Attached(branch) => format!("{} {}{}\n", REF_PREFIX, HEADS_PREFIX, branch),
            Head::Detached(hash) => format!("{}\n", hash),
            Head::Empty => String::new(),
        }
    }

    /// Branch name when attached
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Attached(branch) => Some(branch),
            _ => None,
        }
    }

    /// Whether HEAD names a commit directly
    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached(_))
    }
}

/// Whether `name` may be used as a branch name
///
/// Names must be non-empty, must not be `HEAD`, and must not contain path
/// separators, whitespace or `..`.
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && name != HEAD_REF
        && !name.contains("..")
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace())
}

fn validate_branch_name(name: &str) -> Result<()> {
    if is_valid_branch_name(name) {
        Ok(())
    } else {
        Err(TraceError::invalid_reference(format!("invalid branch name '{}'", name)))
    }
}

/// Manages HEAD and the branch table
#[derive(Debug, Clone)]
pub struct RefManager {
    /// The `.trace` directory
    root: PathBuf,
}

impl RefManager {
    /// Reference manager for the `.trace` directory at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the branch directory and attach HEAD to `default_branch`
    ///
    /// No branch file is written; the branch comes into existence with its
    /// first commit.
    pub fn init_refs(&self, default_branch: &str) -> Result<()> {
        validate_branch_name(default_branch)?;
        fs::create_dir_all(self.root.join(HEADS_DIR))?;
        self.write_head(&Head::Attached(default_branch.to_string()))?;
        info!("HEAD attached to {}", default_branch);
        Ok(())
    }

    /// Read HEAD; a missing file reads as [`Head::Empty`]
    pub fn read_head(&self) -> Result<Head> {
        match fs::read_to_string(self.head_path()) {
            Ok(text) => Ok(Head::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Head::Empty),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace HEAD
    pub fn write_head(&self, head: &Head) -> Result<()> {
        atomic_write(&self.head_path(), head.to_file_contents().as_bytes())
    }

    /// Commit hash HEAD resolves to, `None` when there are no commits
    pub fn get_head(&self) -> Result<Option<String>> {
        match self.read_head()? {
            Head::Attached(branch) => self.branch_target(&branch),
            Head::Detached(hash) => Ok(Some(hash)),
            Head::Empty => Ok(None),
        }
    }

    /// Move HEAD to a newly created commit
    ///
    /// An attached HEAD advances its branch. Otherwise HEAD itself is
    /// rewritten and the branch table is left alone.
    pub fn set_head(&self, hash: &str) -> Result<()> {
        match self.read_head()? {
            Head::Attached(branch) => {
                self.write_branch(&branch, hash)?;
                debug!("Advanced {} to {}", branch, short_hash(hash));
            }
            Head::Detached(_) | Head::Empty => {
                self.write_head(&Head::Detached(hash.to_string()))?;
                debug!("Detached HEAD moved to {}", short_hash(hash));
            }
        }
        Ok(())
    }

    /// Create a branch at the current HEAD commit and attach HEAD to it
    ///
    /// In an empty repository the branch is created without a target.
    ///
    /// # Errors
    ///
    /// - [`TraceError::InvalidReference`] if the name is not allowed
    /// - [`TraceError::BranchExists`] if the branch already exists; nothing is changed
    pub fn create_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        if self.branch_exists(name) {
            return Err(TraceError::BranchExists(name.to_string()));
        }

        let target = self.get_head()?.unwrap_or_default();
        self.write_branch(name, &target)?;
        self.write_head(&Head::Attached(name.to_string()))?;

        info!("Created branch {} at {}", name, short_hash(&target));
        Ok(())
    }

    /// Delete a branch
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotFound`] if the branch does not exist
    /// - [`TraceError::CannotDeleteCurrentBranch`] if HEAD is attached to it
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        if !self.branch_exists(name) {
            return Err(TraceError::not_found(ObjectKind::Branch, name));
        }
        if self.current_branch()?.as_deref() == Some(name) {
            return Err(TraceError::CannotDeleteCurrentBranch(name.to_string()));
        }

        fs::remove_file(self.branch_path(name))?;
        info!("Deleted branch {}", name);
        Ok(())
    }

    /// Names of every branch that has a ref file
    pub fn list_branches(&self) -> Result<BTreeSet<String>> {
        let entries = match fs::read_dir(self.root.join(HEADS_DIR)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut branches = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                branches.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(branches)
    }

    /// Branch HEAD is attached to, `None` when detached
    pub fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.read_head()?.branch().map(str::to_string))
    }

    /// Whether a ref file exists for `name`
    pub fn branch_exists(&self, name: &str) -> bool {
        is_valid_branch_name(name) && self.branch_path(name).is_file()
    }

    /// Commit hash a branch points at, `None` if missing or without commits
    pub fn branch_target(&self, name: &str) -> Result<Option<String>> {
        if !is_valid_branch_name(name) {
            return Ok(None);
        }

        match fs::read_to_string(self.branch_path(name)) {
            Ok(text) => {
                let hash = text.trim();
                Ok((!hash.is_empty()).then(|| hash.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Point HEAD at a branch or commit
    ///
    /// An existing branch name attaches HEAD, even if the same string would
    /// also resolve as a commit prefix. Anything else is resolved through the
    /// store and detaches HEAD at the result.
    pub fn checkout(&self, store: &ObjectStore, reference: &str) -> Result<Head> {
        let head = if self.branch_exists(reference) {
            Head::Attached(reference.to_string())
        } else {
            Head::Detached(store.resolve_ref(self, reference)?)
        };

        self.write_head(&head)?;
        info!("Checked out {:?}", head);
        Ok(head)
    }

    fn write_branch(&self, name: &str, hash: &str) -> Result<()> {
        let contents = if hash.is_empty() {
            String::new()
        } else {
            format!("{}\n", hash)
        };
        atomic_write(&self.branch_path(name), contents.as_bytes())
    }

    fn head_path(&self) -> PathBuf {
        self.root.join(HEAD_FILE)
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.root.join(HEADS_DIR).join(name)
    }

    /// The `.trace` directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}
