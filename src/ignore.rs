//! Ignore rules from `.traceignore`
//!
//! Each non-blank line that is not a `#` comment is a pattern. A
//! root-relative path is ignored when some pattern
//!
//! - equals it exactly,
//! - matches it as a glob (`*` does not cross `/`), or
//! - ends in `/` and names the path's directory or one of its ancestors.
//!
//! Snapshot capture only sees the [`PathFilter`] trait, so any predicate can
//! stand in for the file-based rules.
//!
//! ## Examples
//!
//! ```rust
//! use envtrace::ignore::{IgnoreRules, PathFilter};
//!
//! let rules = IgnoreRules::parse("# local overrides\n*.local\nsecrets/\n").unwrap();
//! assert!(rules.should_ignore(".env.local"));
//! assert!(rules.should_ignore("secrets/prod.env"));
//! assert!(!rules.should_ignore(".env"));
//! ```

use crate::error::{Result, TraceError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// File name of the ignore list at the project root
pub const IGNORE_FILE: &str = ".traceignore";

/// Decides whether a root-relative path is excluded from capture
pub trait PathFilter {
    /// True if `path` should be left out
    fn should_ignore(&self, path: &str) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&str) -> bool,
{
    fn should_ignore(&self, path: &str) -> bool {
        self(path)
    }
}

/// Compiled `.traceignore` patterns
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    exact: Vec<String>,
    dirs: Vec<String>,
    globs: GlobSet,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::empty()
    }
}

impl IgnoreRules {
    /// Rules that ignore nothing
    pub fn empty() -> Self {
        Self {
            exact: Vec::new(),
            dirs: Vec::new(),
            globs: GlobSet::empty(),
        }
    }

    /// Compile patterns from `.traceignore` text
    ///
    /// # Errors
    ///
    /// - [`TraceError::InvalidPattern`] if a line is not a valid glob
    pub fn parse(text: &str) -> Result<Self> {
        let mut exact = Vec::new();
        let mut dirs = Vec::new();
        let mut builder = GlobSetBuilder::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(dir) = line.strip_suffix('/') {
                dirs.push(dir.to_string());
            }
            exact.push(line.to_string());

            let glob = GlobBuilder::new(line)
                .literal_separator(true)
                .build()
                .map_err(|e| TraceError::InvalidPattern(format!("{}: {}", line, e)))?;
            builder.add(glob);
        }

        let globs = builder
            .build()
            .map_err(|e| TraceError::InvalidPattern(e.to_string()))?;

        debug!("Loaded {} ignore patterns", exact.len());
        Ok(Self { exact, dirs, globs })
    }

    /// Load `.traceignore` from the project root; a missing file ignores nothing
    pub fn load(project_root: &Path) -> Result<Self> {
        match fs::read_to_string(project_root.join(IGNORE_FILE)) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether there are no patterns
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

impl PathFilter for IgnoreRules {
    fn should_ignore(&self, path: &str) -> bool {
        if self.exact.iter().any(|p| p == path) {
            return true;
        }

        let under_dir = self.dirs.iter().any(|dir| {
            path == dir
                || path
                    .strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if under_dir {
            return true;
        }

        self.globs.is_match(path)
    }
}
