//! Restore engine
//!
//! Writes files from a historical commit back into the working directory.
//!
//! ## Process
//!
//! 1. Resolve the target commit (an explicit reference, or HEAD)
//! 2. Run the pre-restore hook; failure aborts before any file is touched
//! 3. Pick the files to restore according to the [`RestoreSelection`]
//! 4. For each file, load its blob, back up the current file if asked to,
//!    and write the historical content
//! 5. Run the post-restore hook; failure is recorded but does not fail the restore
//!
//! Restore is best effort. A file that cannot be restored is recorded in the
//! [`RestoreReport`] and the remaining files are still processed.

use crate::commit::Commit;
use crate::config::Hooks;
use crate::error::Result;
use crate::hooks::HookRunner;
use crate::refs::RefManager;
use crate::storage::{ObjectStore, HEAD_REF};
use crate::utils::{atomic_write, backup_path, clean_path, is_contained};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Picks a subset of the files stored in a commit
///
/// Stands in for an interactive prompt. Returning no paths cancels the
/// restore.
pub trait FileChooser {
    /// Choose from `available`, which is sorted
    fn choose(&self, available: &[String]) -> Result<Vec<String>>;
}

/// Which files of the target commit to restore
pub enum RestoreSelection<'a> {
    /// Every file in the commit
    All,
    /// Only these root-relative paths
    Paths(Vec<String>),
    /// Whatever the chooser picks
    Choose(&'a dyn FileChooser),
}

impl std::fmt::Debug for RestoreSelection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreSelection::All => f.write_str("All"),
            RestoreSelection::Paths(paths) => f.debug_tuple("Paths").field(paths).finish(),
            RestoreSelection::Choose(_) => f.write_str("Choose(<chooser>)"),
        }
    }
}

/// Parameters for one restore
#[derive(Debug)]
pub struct RestoreRequest<'a> {
    /// Reference to restore from; `None` means HEAD
    pub target: Option<String>,
    /// Files to restore
    pub selection: RestoreSelection<'a>,
    /// Copy existing files aside before overwriting them
    pub backup: bool,
    /// Hook commands to run
    pub hooks: Hooks,
}

impl Default for RestoreRequest<'_> {
    fn default() -> Self {
        Self {
            target: None,
            selection: RestoreSelection::All,
            backup: true,
            hooks: Hooks::default(),
        }
    }
}

/// What happened to one requested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Content was written
    Restored {
        /// Root-relative path
        path: String,
        /// Where the previous content was copied, if anywhere
        backup: Option<PathBuf>,
    },
    /// Requested but not present in the commit
    Skipped {
        /// Root-relative path
        path: String,
        /// Why it was skipped
        reason: String,
    },
    /// Could not be restored
    Failed {
        /// Root-relative path
        path: String,
        /// What went wrong
        reason: String,
    },
}

impl FileOutcome {
    /// Path this outcome refers to
    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Restored { path, .. }
            | FileOutcome::Skipped { path, .. }
            | FileOutcome::Failed { path, .. } => path,
        }
    }

    /// Whether the file was written
    pub fn is_restored(&self) -> bool {
        matches!(self, FileOutcome::Restored { .. })
    }
}

/// Result of the post-restore hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HookStatus {
    /// No hook configured, or the restore was cancelled
    #[default]
    NotRun,
    /// Hook exited successfully
    Succeeded,
    /// Hook failed; the restore itself still counts
    Failed(String),
}

/// Aggregate outcome of a restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Commit the files came from
    pub commit_hash: String,
    /// Number of files written
    pub restored: usize,
    /// Per-file outcomes, in processing order
    pub outcomes: Vec<FileOutcome>,
    /// Post-restore hook result
    pub post_hook: HookStatus,
    /// The chooser picked nothing and no file was written
    pub cancelled: bool,
}

impl RestoreReport {
    fn new(commit_hash: String) -> Self {
        Self {
            commit_hash,
            restored: 0,
            outcomes: Vec::new(),
            post_hook: HookStatus::NotRun,
            cancelled: false,
        }
    }

    /// Outcomes for files that were skipped
    pub fn skipped(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    /// Outcomes for files that failed
    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    /// True when every requested file was written
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(FileOutcome::is_restored)
    }
}

/// Applies historical snapshots to the working directory
pub struct RestoreEngine<'a> {
    store: &'a ObjectStore,
    refs: &'a RefManager,
    project_root: &'a Path,
    runner: &'a dyn HookRunner,
}

impl<'a> RestoreEngine<'a> {
    /// Engine writing into `project_root`
    pub fn new(
        store: &'a ObjectStore,
        refs: &'a RefManager,
        project_root: &'a Path,
        runner: &'a dyn HookRunner,
    ) -> Self {
        Self {
            store,
            refs,
            project_root,
            runner,
        }
    }

    /// Run a restore
    ///
    /// # Errors
    ///
    /// - `TraceError::NoCommitsYet` if no target is given and HEAD is empty
    /// - Any resolution or load error for the target commit
    /// - `TraceError::HookFailure` if the pre-restore hook fails
    /// - Errors from the chooser
    ///
    /// Per-file problems are reported in the returned [`RestoreReport`].
    pub fn restore(&self, request: RestoreRequest<'_>) -> Result<RestoreReport> {
        let hash = match request.target.as_deref() {
            Some(reference) => self.store.resolve_ref(self.refs, reference)?,
            None => self.store.resolve_ref(self.refs, HEAD_REF)?,
        };
        let commit = self.store.load_commit(&hash)?;
        info!("Restoring from {}", commit.display_format());

        if let Some(command) = request.hooks.pre() {
            self.runner.run(command)?;
        }

        let mut report = RestoreReport::new(commit.hash.clone());
        let selected = match select_files(&commit, request.selection, &mut report)? {
            Some(selected) => selected,
            None => {
                info!("No files chosen, restore cancelled");
                report.cancelled = true;
                return Ok(report);
            }
        };

        for (path, blob_hash) in &selected {
            let outcome = self.restore_file(path, blob_hash, request.backup);
            match &outcome {
                FileOutcome::Restored { .. } => report.restored += 1,
                FileOutcome::Failed { reason, .. } => warn!("Failed to restore {}: {}", path, reason),
                FileOutcome::Skipped { .. } => {}
            }
            report.outcomes.push(outcome);
        }

        if let Some(command) = request.hooks.post() {
            report.post_hook = match self.runner.run(command) {
                Ok(()) => HookStatus::Succeeded,
                Err(e) => {
                    warn!("Post-restore hook failed: {}", e);
                    HookStatus::Failed(e.to_string())
                }
            };
        }

        info!(
            "Restored {} of {} files from {}",
            report.restored,
            report.outcomes.len(),
            commit.short_hash()
        );
        Ok(report)
    }

    fn restore_file(&self, path: &str, blob_hash: &str, backup: bool) -> FileOutcome {
        let failed = |reason: String| FileOutcome::Failed {
            path: path.to_string(),
            reason,
        };

        if !is_contained(path) {
            return failed("path escapes the project root".to_string());
        }

        let content = match self.store.load_blob(blob_hash) {
            Ok(content) => content,
            Err(e) => return failed(e.to_string()),
        };

        let destination = self.project_root.join(path);
        let mut backup_file = None;
        if backup && destination.is_file() {
            let target = backup_path(&destination, Utc::now());
            if let Err(e) = fs::copy(&destination, &target) {
                return failed(format!("backup failed: {}", e));
            }
            debug!("Backed up {} to {:?}", path, target);
            backup_file = Some(target);
        }

        if let Err(e) = atomic_write(&destination, &content) {
            return failed(e.to_string());
        }

        debug!("Restored {} ({} bytes)", path, content.len());
        FileOutcome::Restored {
            path: path.to_string(),
            backup: backup_file,
        }
    }
}

/// Files to restore, or `None` when the chooser cancelled
fn select_files(
    commit: &Commit,
    selection: RestoreSelection<'_>,
    report: &mut RestoreReport,
) -> Result<Option<BTreeMap<String, String>>> {
    let files = &commit.snapshot.files;

    let requested = match selection {
        RestoreSelection::All => return Ok(Some(files.clone())),
        RestoreSelection::Paths(paths) => paths,
        RestoreSelection::Choose(chooser) => {
            let available: Vec<String> = files.keys().cloned().collect();
            let chosen = chooser.choose(&available)?;
            if chosen.is_empty() {
                return Ok(None);
            }
            chosen
        }
    };

    let mut selected = BTreeMap::new();
    for raw in requested {
        let path = clean_path(&raw);
        match files.get(&path) {
            Some(hash) => {
                selected.insert(path, hash.clone());
            }
            None => {
                debug!("{} is not in commit {}", path, commit.short_hash());
                report.outcomes.push(FileOutcome::Skipped {
                    path,
                    reason: "not in commit".to_string(),
                });
            }
        }
    }
    Ok(Some(selected))
}
