//! Error types for envtrace
//!
//! Every failure the engine can report is a variant of [`TraceError`]. The
//! variants are structured so callers (the CLI, or anything embedding the
//! library) can tell conditions apart without parsing message text.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the envtrace library
pub type Result<T> = std::result::Result<T, TraceError>;

/// Kind of object a [`TraceError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Raw content blob
    Blob,
    /// Commit record
    Commit,
    /// Branch reference
    Branch,
    /// Any reference string (hash, prefix, branch or `HEAD`)
    Reference,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Commit => "commit",
            ObjectKind::Branch => "branch",
            ObjectKind::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Main error type for all envtrace operations
#[derive(Debug, Error)]
pub enum TraceError {
    /// Missing blob, commit, branch or reference target
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was being looked up
        kind: ObjectKind,
        /// The identifier that failed to resolve
        id: String,
    },

    /// A partial hash matched more than one commit
    #[error("ambiguous reference '{reference}' matches {} commits", .candidates.len())]
    Ambiguous {
        /// The prefix supplied by the caller
        reference: String,
        /// Every commit hash sharing that prefix
        candidates: Vec<String>,
    },

    /// Malformed reference or branch name
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The operation needs history and there is none
    #[error("no commits yet")]
    NoCommitsYet,

    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes that do not deserialize
    #[error("failed to parse {what}: {source}")]
    Parse {
        /// Which file or record failed
        what: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Errors during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External hook command failed or could not start
    #[error("hook '{command}' failed: {reason}")]
    HookFailure {
        /// Command line that was run
        command: String,
        /// Exit status or spawn error
        reason: String,
    },

    /// Branch creation collided with an existing name
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// Attempt to delete the branch HEAD is attached to
    #[error("cannot delete current branch '{0}'")]
    CannotDeleteCurrentBranch(String),

    /// Commit message was empty
    #[error("commit message required")]
    EmptyMessage,

    /// Stored object content no longer matches its address
    #[error("corrupt object - expected: {expected}, actual: {actual}")]
    CorruptObject {
        /// Address the object is stored under
        expected: String,
        /// Hash of the bytes actually found
        actual: String,
    },

    /// `.trace` directory missing
    #[error("not a trace repository: {0:?}")]
    NotInitialized(PathBuf),

    /// `.trace` already set up
    #[error("trace repository already exists at {0:?}")]
    AlreadyInitialized(PathBuf),

    /// Walked to the filesystem root without finding a marker
    #[error("project root not found from {0:?} (no .trace or .git)")]
    ProjectRootNotFound(PathBuf),

    /// Ignore pattern that globset rejects
    #[error("invalid ignore pattern: {0}")]
    InvalidPattern(String),
}

impl TraceError {
    /// Shorthand for a [`TraceError::NotFound`]
    pub fn not_found(kind: ObjectKind, id: impl Into<String>) -> Self {
        TraceError::NotFound { kind, id: id.into() }
    }

    /// Shorthand for a [`TraceError::InvalidReference`]
    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        TraceError::InvalidReference(msg.into())
    }

    /// Wrap a serde error with the name of what was being parsed
    pub fn parse(what: impl Into<String>, source: serde_json::Error) -> Self {
        TraceError::Parse { what: what.into(), source }
    }

    /// Check if this error means something was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, TraceError::NotFound { .. })
    }

    /// Check if this error indicates store corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            TraceError::CorruptObject { .. } | TraceError::Parse { .. }
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            TraceError::NoCommitsYet => {
                "No commits yet. Run 'trace snap <message>' to create your first commit.".to_string()
            }
            TraceError::NotInitialized(path) => {
                format!("No trace repository at {:?}. Run 'trace init' first.", path)
            }
            TraceError::Ambiguous { reference, candidates } => {
                let shown: Vec<&str> = candidates
                    .iter()
                    .map(|c| &c[..c.len().min(12)])
                    .collect();
                format!(
                    "Reference '{}' is ambiguous. Candidates: {}. Use a longer prefix.",
                    reference,
                    shown.join(", ")
                )
            }
            TraceError::CannotDeleteCurrentBranch(name) => {
                format!(
                    "Cannot delete '{}' while it is checked out. Switch to another branch first.",
                    name
                )
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TraceError::not_found(ObjectKind::Commit, "abc123");
        assert_eq!(err.to_string(), "commit not found: abc123");

        let err = TraceError::Ambiguous {
            reference: "abcd".to_string(),
            candidates: vec!["abcd1".to_string(), "abcd2".to_string()],
        };
        assert_eq!(err.to_string(), "ambiguous reference 'abcd' matches 2 commits");
    }

    #[test]
    fn test_error_classification() {
        assert!(TraceError::not_found(ObjectKind::Blob, "x").is_not_found());
        assert!(!TraceError::NoCommitsYet.is_not_found());
        assert!(TraceError::CorruptObject {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        }
        .is_corruption());
        assert!(!TraceError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "test")).is_corruption());
    }

    #[test]
    fn test_user_message_suggests_longer_prefix() {
        let err = TraceError::Ambiguous {
            reference: "abcd".to_string(),
            candidates: vec!["abcd".repeat(16), "abce".repeat(16)],
        };
        let msg = err.user_message();
        assert!(msg.contains("longer prefix"));
        assert!(msg.contains("abcdabcdabcd"));
    }
}
