//! Commit and history verification
//!
//! Verification works at two levels:
//!
//! 1. **Commit level**: the stored hash matches the recomputed one, every
//!    referenced blob exists and still hashes to its address, and the parent
//!    (if any) is present.
//! 2. **History level**: every commit reachable from a starting point passes
//!    commit-level checks.
//!
//! Problems are collected into reports rather than returned as errors, so a
//! single run lists everything that is wrong. Only failures that prevent
//! verification from running at all (such as an unreadable commit at the
//! start of the chain) surface as `Err`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use envtrace::Trace;
//!
//! # fn main() -> envtrace::Result<()> {
//! let trace = Trace::discover(std::env::current_dir()?)?;
//! let report = trace.verify_history()?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use crate::commit::Commit;
use crate::error::Result;
use crate::storage::ObjectStore;
use crate::utils::short_hash;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Verifies commits against the object store
#[derive(Debug)]
pub struct CommitVerifier<'a> {
    store: &'a ObjectStore,
}

impl<'a> CommitVerifier<'a> {
    /// Create a verifier backed by `store`
    pub fn new(store: &'a ObjectStore) -> Self {
        Self { store }
    }

    /// Check one commit
    pub fn verify_commit(&self, commit: &Commit) -> VerificationReport {
        let mut report = VerificationReport::new(commit.hash.clone());

        let computed = commit.compute_hash();
        report.hash_valid = computed == commit.hash;
        if !report.hash_valid {
            report.errors.push(format!(
                "Hash mismatch: stored {}, computed {}",
                short_hash(&commit.hash),
                short_hash(&computed)
            ));
        }

        for (path, blob_hash) in &commit.snapshot.files {
            report.blobs_checked += 1;
            match self.store.verify_blob(blob_hash) {
                Ok(()) => report.blobs_valid += 1,
                Err(e) => report.errors.push(format!("{}: {}", path, e)),
            }
        }

        report.parent_valid = match &commit.parent {
            Some(parent) => self.store.commit_exists(parent),
            None => true,
        };
        if !report.parent_valid {
            report.errors.push(format!(
                "Parent {} not found",
                commit.parent.as_deref().map(short_hash).unwrap_or_default()
            ));
        }

        debug!(
            "Verified {}: {}/{} blobs valid",
            commit.short_hash(),
            report.blobs_valid,
            report.blobs_checked
        );
        report
    }

    /// Check every commit reachable from `start`
    ///
    /// Walking stops at the first parent that cannot be loaded; the missing
    /// link is recorded as a broken chain.
    pub fn verify_history(&self, start: Option<&str>) -> Result<HistoryVerificationReport> {
        let started = Instant::now();
        let mut report = HistoryVerificationReport {
            chain_intact: true,
            ..Default::default()
        };

        let mut current = start.map(str::to_string);
        while let Some(hash) = current {
            let commit = match self.store.load_commit(&hash) {
                Ok(commit) => commit,
                Err(e) if report.total_commits == 0 => return Err(e),
                Err(e) => {
                    warn!("History broken at {}: {}", short_hash(&hash), e);
                    report.chain_intact = false;
                    report.broken_at = Some(hash);
                    break;
                }
            };

            let commit_report = self.verify_commit(&commit);
            report.total_commits += 1;
            if commit_report.is_valid() {
                report.valid_commits += 1;
            }
            report.commit_reports.push(commit_report);
            current = commit.parent;
        }

        report.verification_time_ms = started.elapsed().as_millis() as u64;
        info!("{}", report.summary());
        Ok(report)
    }
}

/// Result of verifying one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Commit being verified
    pub commit_hash: String,
    /// Stored hash matches the recomputed one
    pub hash_valid: bool,
    /// Parent exists, or there is none
    pub parent_valid: bool,
    /// Blobs referenced by the snapshot
    pub blobs_checked: usize,
    /// Blobs present and intact
    pub blobs_valid: usize,
    /// Everything that went wrong
    pub errors: Vec<String>,
}

impl VerificationReport {
    /// Create an empty report for `commit_hash`
    pub fn new(commit_hash: String) -> Self {
        Self {
            commit_hash,
            hash_valid: false,
            parent_valid: false,
            blobs_checked: 0,
            blobs_valid: 0,
            errors: Vec::new(),
        }
    }

    /// Check if the commit is fully valid
    pub fn is_valid(&self) -> bool {
        self.hash_valid
            && self.parent_valid
            && self.blobs_valid == self.blobs_checked
            && self.errors.is_empty()
    }

    /// Get a summary of the verification
    pub fn summary(&self) -> String {
        if self.is_valid() {
            format!(
                "Commit {} is valid ({} blobs verified)",
                short_hash(&self.commit_hash),
                self.blobs_checked
            )
        } else {
            let issues = [
                (!self.hash_valid).then_some("hash mismatch"),
                (!self.parent_valid).then_some("parent missing"),
                (self.blobs_valid < self.blobs_checked).then_some("blob failures"),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");

            format!(
                "Commit {} is invalid: {} ({}/{} blobs valid)",
                short_hash(&self.commit_hash),
                issues,
                self.blobs_valid,
                self.blobs_checked
            )
        }
    }
}

/// Result of verifying a chain of commits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryVerificationReport {
    /// Commits visited
    pub total_commits: usize,
    /// Commits that passed every check
    pub valid_commits: usize,
    /// Every parent link could be followed to the root
    pub chain_intact: bool,
    /// First hash that could not be loaded
    pub broken_at: Option<String>,
    /// Per-commit reports, most recent first
    pub commit_reports: Vec<VerificationReport>,
    /// Total verification time in milliseconds
    pub verification_time_ms: u64,
}

impl HistoryVerificationReport {
    /// Check if the whole history is valid
    pub fn is_valid(&self) -> bool {
        self.chain_intact && self.valid_commits == self.total_commits
    }

    /// Get a summary of the history verification
    pub fn summary(&self) -> String {
        if self.total_commits == 0 {
            "No commits to verify".to_string()
        } else if self.is_valid() {
            format!(
                "History is valid: {} commits verified in {}ms",
                self.total_commits, self.verification_time_ms
            )
        } else {
            format!(
                "History has issues: {}/{} commits valid{} in {}ms",
                self.valid_commits,
                self.total_commits,
                if self.chain_intact { "" } else { ", chain broken" },
                self.verification_time_ms
            )
        }
    }
}
