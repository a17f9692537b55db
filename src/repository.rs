//! Repository facade
//!
//! [`Trace`] ties the object store, references, configuration, ignore rules
//! and hook runner of one project together and exposes the operations the CLI
//! is built from: snapshotting, status and diff, history, branching, restore,
//! tracking and verification.
//!
//! ## Example
//!
//! ```rust
//! use envtrace::Trace;
//! use tempfile::TempDir;
//!
//! # fn main() -> envtrace::Result<()> {
//! let project = TempDir::new()?;
//! std::fs::write(project.path().join(".env"), "API_KEY=secret\n")?;
//!
//! let trace = Trace::init(project.path())?;
//! let commit = trace.snap("initial state")?;
//! assert!(commit.snapshot.env_keys.contains_key("API_KEY"));
//!
//! std::fs::write(project.path().join(".env"), "API_KEY=rotated\n")?;
//! let status = trace.status()?;
//! assert!(!status.is_clean());
//! # Ok(())
//! # }
//! ```

use crate::commit::Commit;
use crate::config::{TraceConfig, CONFIG_FILE};
use crate::diff::{compare_snapshots, Drift};
use crate::error::{Result, TraceError};
use crate::hooks::{HookRunner, ShellHookRunner};
use crate::ignore::{IgnoreRules, PathFilter};
use crate::refs::{Head, RefManager};
use crate::restore::{RestoreEngine, RestoreReport, RestoreRequest};
use crate::snapshot::Snapshot;
use crate::storage::{ObjectStore, HEAD_REF};
use crate::types::{RestoreOptions, Status, TrackOutcome};
use crate::utils::{clean_path, find_project_root, TRACE_DIR};
use crate::verification::{CommitVerifier, HistoryVerificationReport, VerificationReport};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A trace repository rooted at one project directory
pub struct Trace {
    /// Project directory holding the tracked files
    project_root: PathBuf,
    /// Object store under `.trace`
    store: ObjectStore,
    /// HEAD and branches under `.trace`
    refs: RefManager,
    /// Loaded `.trace/config.json`
    config: TraceConfig,
    /// Loaded `.traceignore`
    ignore: IgnoreRules,
    /// Runs restore hooks
    hook_runner: Box<dyn HookRunner>,
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("project_root", &self.project_root)
            .field("store", &self.store)
            .field("config", &self.config)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

impl Trace {
    /// Create a new repository in `project_root`
    ///
    /// Lays out `.trace/` with its object, ref and log directories, writes a
    /// default config unless one exists, and attaches HEAD to the configured
    /// default branch.
    ///
    /// # Errors
    ///
    /// - [`TraceError::AlreadyInitialized`] if `.trace/HEAD` already exists
    #[instrument(skip_all, fields(root = ?project_root.as_ref()))]
    pub fn init(project_root: impl AsRef<Path>) -> Result<Self> {
        let project_root = project_root.as_ref();
        let trace_dir = project_root.join(TRACE_DIR);
        if trace_dir.join("HEAD").exists() {
            return Err(TraceError::AlreadyInitialized(trace_dir));
        }

        ObjectStore::init(&trace_dir)?;
        fs::create_dir_all(trace_dir.join("logs"))?;
        let config = TraceConfig::init(&trace_dir.join(CONFIG_FILE))?;
        RefManager::new(&trace_dir).init_refs(&config.default_branch)?;

        info!("Initialized trace repository in {:?}", trace_dir);
        Self::open(project_root)
    }

    /// Open the repository in `project_root`
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotInitialized`] if there is no `.trace` directory
    /// - [`TraceError::Parse`] if the config is malformed
    /// - [`TraceError::InvalidPattern`] if `.traceignore` has a bad glob
    #[instrument(skip_all, fields(root = ?project_root.as_ref()))]
    pub fn open(project_root: impl AsRef<Path>) -> Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        let trace_dir = project_root.join(TRACE_DIR);
        if !trace_dir.is_dir() {
            return Err(TraceError::NotInitialized(project_root));
        }

        let store = ObjectStore::open(&trace_dir)?;
        let refs = RefManager::new(&trace_dir);
        let config = TraceConfig::load(&trace_dir.join(CONFIG_FILE))?;
        let ignore = IgnoreRules::load(&project_root)?;
        let hook_runner = Box::new(ShellHookRunner::in_dir(&project_root));

        debug!("Opened trace repository at {:?}", project_root);
        Ok(Self {
            project_root,
            store,
            refs,
            config,
            ignore,
            hook_runner,
        })
    }

    /// Open the repository containing `start`
    ///
    /// Walks upward for `.trace`, falling back to the nearest `.git`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let root = find_project_root(start.as_ref())?;
        Self::open(root)
    }

    /// Replace the hook runner
    pub fn with_hook_runner(mut self, runner: impl HookRunner + 'static) -> Self {
        self.hook_runner = Box::new(runner);
        self
    }

    /// Project directory
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Underlying object store
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Underlying reference manager
    pub fn refs(&self) -> &RefManager {
        &self.refs
    }

    /// Loaded configuration
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Capture the current state of the tracked files
    pub fn capture(&self) -> Result<Snapshot> {
        Snapshot::collect(
            &self.store,
            &self.project_root,
            &self.config.tracked_files,
            &self.ignore,
        )
    }

    /// Commit the current state on top of HEAD
    ///
    /// # Errors
    ///
    /// - [`TraceError::EmptyMessage`] if `message` is blank
    #[instrument(skip(self))]
    pub fn snap(&self, message: &str) -> Result<Commit> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TraceError::EmptyMessage);
        }

        let snapshot = self.capture()?;
        self.commit_snapshot(message, snapshot)
    }

    /// Commit only if the current state differs from HEAD
    ///
    /// Always commits when there is no HEAD yet.
    #[instrument(skip(self))]
    pub fn snap_if_changed(&self, message: &str) -> Result<Option<Commit>> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TraceError::EmptyMessage);
        }

        let snapshot = self.capture()?;
        if let Some(head) = self.head_commit()? {
            if compare_snapshots(&head.snapshot, &snapshot).is_empty() {
                debug!("No changes since {}, skipping commit", head.short_hash());
                return Ok(None);
            }
        }
        self.commit_snapshot(message, snapshot).map(Some)
    }

    fn commit_snapshot(&self, message: &str, snapshot: Snapshot) -> Result<Commit> {
        let parent = self.refs.get_head()?;
        let commit = Commit::new(parent, message, snapshot);

        self.store.save_commit(&commit)?;
        self.refs.set_head(&commit.hash)?;

        info!("Committed {}", commit.display_format());
        Ok(commit)
    }

    /// Commit hash HEAD resolves to
    pub fn head(&self) -> Result<Option<String>> {
        self.refs.get_head()
    }

    /// The commit HEAD resolves to
    pub fn head_commit(&self) -> Result<Option<Commit>> {
        match self.refs.get_head()? {
            Some(hash) => self.store.load_commit(&hash).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve any reference to a commit hash
    pub fn resolve(&self, reference: &str) -> Result<String> {
        self.store.resolve_ref(&self.refs, reference)
    }

    /// Load the commit a reference names
    pub fn commit(&self, reference: &str) -> Result<Commit> {
        let hash = self.resolve(reference)?;
        self.store.load_commit(&hash)
    }

    /// Where HEAD is and how the working files differ from it
    #[instrument(skip(self))]
    pub fn status(&self) -> Result<Status> {
        let branch = self.refs.current_branch()?;
        let head = self.head_commit()?;

        let drift = match &head {
            Some(commit) => Some(compare_snapshots(&commit.snapshot, &self.capture()?)),
            None => None,
        };

        Ok(Status {
            branch,
            head: head.map(|c| c.hash),
            drift,
        })
    }

    /// Compare a commit (HEAD by default) with the working files
    ///
    /// # Errors
    ///
    /// - [`TraceError::NoCommitsYet`] if no target is given and HEAD is empty
    #[instrument(skip(self))]
    pub fn diff_working(&self, target: Option<&str>) -> Result<Drift> {
        let commit = self.commit(target.unwrap_or(HEAD_REF))?;
        Ok(compare_snapshots(&commit.snapshot, &self.capture()?))
    }

    /// Compare two commits, `from` being the older side
    #[instrument(skip(self))]
    pub fn diff_commits(&self, from: &str, to: &str) -> Result<Drift> {
        let old = self.commit(from)?;
        let new = self.commit(to)?;
        Ok(compare_snapshots(&old.snapshot, &new.snapshot))
    }

    /// History from HEAD, most recent first
    pub fn log(&self, limit: Option<usize>) -> Result<Vec<Commit>> {
        let Some(head) = self.refs.get_head()? else {
            return Ok(Vec::new());
        };

        let mut history = self.store.commit_history(&head)?;
        if let Some(limit) = limit {
            history.truncate(limit);
        }
        Ok(history)
    }

    /// All branch names
    pub fn branches(&self) -> Result<BTreeSet<String>> {
        self.refs.list_branches()
    }

    /// Branch HEAD is attached to
    pub fn current_branch(&self) -> Result<Option<String>> {
        self.refs.current_branch()
    }

    /// Create a branch at HEAD and switch to it
    #[instrument(skip(self))]
    pub fn create_branch(&self, name: &str) -> Result<()> {
        self.refs.create_branch(name)
    }

    /// Delete a branch other than the current one
    #[instrument(skip(self))]
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.refs.delete_branch(name)
    }

    /// Move HEAD to a branch or commit
    ///
    /// Only HEAD moves; working files are left alone until a restore.
    #[instrument(skip(self))]
    pub fn checkout(&self, reference: &str) -> Result<Head> {
        self.refs.checkout(&self.store, reference)
    }

    /// Restore files from history using the configured hooks and backup policy
    #[instrument(skip(self, options), fields(target = ?options.target))]
    pub fn restore(&self, options: RestoreOptions<'_>) -> Result<RestoreReport> {
        let request = RestoreRequest {
            target: options.target,
            selection: options.selection,
            backup: self.config.backup_on_restore && !options.no_backup,
            hooks: self.config.hooks.clone(),
        };

        RestoreEngine::new(
            &self.store,
            &self.refs,
            &self.project_root,
            self.hook_runner.as_ref(),
        )
        .restore(request)
    }

    /// Add paths to the tracked list and save the config
    ///
    /// Paths matched by `.traceignore` are refused.
    #[instrument(skip(self, paths))]
    pub fn track<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<TrackOutcome> {
        let mut outcome = TrackOutcome::default();

        for raw in paths {
            let path = clean_path(raw.as_ref());
            if self.ignore.should_ignore(&path) {
                outcome.ignored.push(path);
            } else if self.config.add_tracked_file(&path) {
                outcome.added.push(path);
            } else {
                outcome.already_tracked.push(path);
            }
        }

        if outcome.changed() {
            let config_path = self.project_root.join(TRACE_DIR).join(CONFIG_FILE);
            self.config.save(&config_path)?;
            info!("Now tracking {} new paths", outcome.added.len());
        }
        Ok(outcome)
    }

    /// Verify one commit and the blobs it references
    pub fn verify(&self, reference: &str) -> Result<VerificationReport> {
        let commit = self.commit(reference)?;
        Ok(CommitVerifier::new(&self.store).verify_commit(&commit))
    }

    /// Verify every commit reachable from HEAD
    pub fn verify_history(&self) -> Result<HistoryVerificationReport> {
        let head = self.refs.get_head()?;
        CommitVerifier::new(&self.store).verify_history(head.as_deref())
    }
}
