//! # envtrace - Version control for your environment
//!
//! A small, Git-like history for `.env` files and other tracked
//! configuration that lives outside your main version control.
//!
//! ## Overview
//!
//! envtrace keeps a repository under `.trace/` in your project and lets you:
//! - Snapshot tracked files into immutable, content-addressed commits
//! - See which files and environment keys drifted since the last snapshot
//! - Compare any two commits
//! - Restore files from any commit, with automatic backups and hooks
//! - Keep parallel lines of history on branches
//! - Verify that stored objects have not been tampered with
//!
//! ## Architecture
//!
//! - **Object store**: file contents (blobs) and commits are stored by the
//!   SHA-256 of their content and never rewritten
//! - **Refs**: branches are files holding a commit hash; `HEAD` either names
//!   a branch or holds a hash directly (detached)
//! - **Snapshots**: map each tracked path to a blob hash, and each key found
//!   in a `.env` file to the hash of its value. Secrets are never stored in
//!   the commit itself
//! - **Diff engine**: compares snapshots by hash only
//! - **Restore engine**: writes selected files back atomically, with
//!   optional backups and pre/post hooks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use envtrace::Trace;
//!
//! # fn main() -> envtrace::Result<()> {
//! let trace = Trace::init("./my_project")?;
//!
//! // Record the current .env
//! let commit = trace.snap("working local setup")?;
//! println!("Committed {}", commit.short_hash());
//!
//! // Edit .env, then check what changed
//! let status = trace.status()?;
//! if !status.is_clean() {
//!     println!("Environment drifted");
//! }
//!
//! // Put everything back the way it was
//! let report = trace.restore(Default::default())?;
//! println!("Restored {} files", report.restored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Restoring a subset
//!
//! ```rust,no_run
//! use envtrace::{RestoreOptions, RestoreSelection, Trace};
//!
//! # fn main() -> envtrace::Result<()> {
//! let trace = Trace::discover(std::env::current_dir()?)?;
//! let report = trace.restore(RestoreOptions {
//!     target: Some("a1b2".to_string()),
//!     selection: RestoreSelection::Paths(vec![".env".to_string()]),
//!     no_backup: false,
//! })?;
//! for outcome in &report.outcomes {
//!     println!("{}: restored={}", outcome.path(), outcome.is_restored());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## References
//!
//! Anywhere a commit is expected you can pass a full hash, a branch name,
//! `HEAD`, or a unique hash prefix of at least four characters.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, TraceError>`. Missing objects,
//! ambiguous prefixes and hook failures are distinct variants so callers can
//! react to each; [`TraceError::user_message`] gives a one-line explanation
//! suitable for a terminal.
//!
//! ## Module Organization
//!
//! - [`storage`]: Content-addressed blobs and commits, reference resolution
//! - [`refs`]: Branches and `HEAD`
//! - [`snapshot`]: Capturing tracked files and parsing env keys
//! - [`commit`]: Commit records and their hashes
//! - [`diff`]: Comparing snapshots
//! - [`restore`]: Writing files back from a commit
//! - [`verification`]: Integrity checking
//! - [`config`]: `.trace/config.json`
//! - [`ignore`]: `.traceignore` rules
//! - [`hooks`]: Running restore hooks
//! - [`types`]: Facade result and option types
//! - [`error`]: Error types and handling

// Public API modules
pub mod commit;
pub mod config;
pub mod diff;
pub mod error;
pub mod hooks;
pub mod ignore;
pub mod refs;
pub mod restore;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod utils;
pub mod verification;

mod repository;

// Re-exports for convenience
pub use commit::Commit;
pub use config::{Hooks, TraceConfig};
pub use diff::{compare_map, compare_snapshots, Drift, EnvDiff, FileDiff, MapDiff};
pub use error::{ObjectKind, Result, TraceError};
pub use hooks::{HookRunner, NoOpHookRunner, ShellHookRunner};
pub use ignore::{IgnoreRules, PathFilter};
pub use refs::{Head, RefManager};
pub use repository::Trace;
pub use restore::{
    FileChooser, FileOutcome, HookStatus, RestoreEngine, RestoreReport, RestoreRequest,
    RestoreSelection,
};
pub use snapshot::Snapshot;
pub use storage::ObjectStore;
pub use types::*;
pub use verification::{CommitVerifier, HistoryVerificationReport, VerificationReport};
