//! Result and option types returned by the [`Trace`](crate::Trace) facade

use crate::diff::Drift;
use crate::restore::RestoreSelection;
use crate::utils::short_hash;
use serde::Serialize;

/// Where HEAD is and how the working environment differs from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Attached branch, `None` when HEAD is detached
    pub branch: Option<String>,
    /// Commit HEAD resolves to, `None` before the first commit
    pub head: Option<String>,
    /// Differences from HEAD's snapshot; `None` before the first commit
    pub drift: Option<Drift>,
}

impl Status {
    /// Whether the working environment matches HEAD
    ///
    /// A repository without commits is never clean.
    pub fn is_clean(&self) -> bool {
        self.drift.as_ref().is_some_and(Drift::is_empty)
    }

    /// Human-readable location of HEAD
    pub fn location(&self) -> String {
        match (&self.branch, &self.head) {
            (Some(branch), _) => format!("On branch {}", branch),
            (None, Some(head)) => format!("HEAD detached at {}", short_hash(head)),
            (None, None) => "No HEAD".to_string(),
        }
    }
}

/// Result of adding paths to the tracked list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackOutcome {
    /// Newly tracked paths
    pub added: Vec<String>,
    /// Paths that were tracked before
    pub already_tracked: Vec<String>,
    /// Paths refused because `.traceignore` matches them
    pub ignored: Vec<String>,
}

impl TrackOutcome {
    /// Whether the config changed
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Options for [`Trace::restore`](crate::Trace::restore)
///
/// Hooks and the default backup policy come from the repository config.
#[derive(Debug)]
pub struct RestoreOptions<'a> {
    /// Reference to restore from; `None` means HEAD
    pub target: Option<String>,
    /// Files to restore
    pub selection: RestoreSelection<'a>,
    /// Skip backups even if the config enables them
    pub no_backup: bool,
}

impl Default for RestoreOptions<'_> {
    fn default() -> Self {
        Self {
            target: None,
            selection: RestoreSelection::All,
            no_backup: false,
        }
    }
}
