//! Repository configuration
//!
//! Settings live in `.trace/config.json`:
//!
//! ```json
//! {
//!   "tracked_files": [".env"],
//!   "default_branch": "main",
//!   "backup_on_restore": true,
//!   "hooks": {
//!     "pre_restore": "docker compose stop",
//!     "post_restore": "docker compose up -d"
//!   }
//! }
//! ```
//!
//! Missing fields take their defaults. The engine treats the loaded
//! [`TraceConfig`] as a plain value and never writes it back on its own.

use crate::error::{Result, TraceError};
use crate::utils::{atomic_write, clean_path};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Config file name inside `.trace`
pub const CONFIG_FILE: &str = "config.json";

/// Branch HEAD attaches to in a new repository
pub const DEFAULT_BRANCH: &str = "main";

/// Commands run around a restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    /// Runs before any file is touched; failure aborts the restore
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_restore: Option<String>,
    /// Runs after files are written; failure is only reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_restore: Option<String>,
}

impl Hooks {
    /// Whether neither hook is set
    pub fn is_empty(&self) -> bool {
        self.pre().is_none() && self.post().is_none()
    }

    /// Pre-restore command; blank strings count as unset
    pub fn pre(&self) -> Option<&str> {
        non_blank(&self.pre_restore)
    }

    /// Post-restore command; blank strings count as unset
    pub fn post(&self) -> Option<&str> {
        non_blank(&self.post_restore)
    }
}

fn non_blank(command: &Option<String>) -> Option<&str> {
    command.as_deref().filter(|c| !c.trim().is_empty())
}

/// Settings for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Root-relative paths captured by each snapshot
    #[serde(default = "default_tracked_files")]
    pub tracked_files: Vec<String>,
    /// Branch HEAD attaches to on init
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Copy files aside before a restore overwrites them
    #[serde(default = "default_true")]
    pub backup_on_restore: bool,
    /// Restore hooks
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,
}

fn default_tracked_files() -> Vec<String> {
    vec![".env".to_string()]
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            tracked_files: default_tracked_files(),
            default_branch: default_branch(),
            backup_on_restore: true,
            hooks: Hooks::default(),
        }
    }
}

impl TraceConfig {
    /// Load config from `path`, falling back to defaults if it does not exist
    ///
    /// # Errors
    ///
    /// - [`TraceError::Parse`] if the file is not valid config JSON
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut config: TraceConfig =
            serde_json::from_str(&text).map_err(|e| TraceError::parse("config.json", e))?;
        if config.default_branch.trim().is_empty() {
            config.default_branch = default_branch();
        }
        Ok(config)
    }

    /// Write config to `path` as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// Write a default config unless one already exists, returning what is on disk
    pub fn init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Add a tracked path unless an equivalent one is already listed
    ///
    /// Returns whether the list changed.
    pub fn add_tracked_file(&mut self, file: &str) -> bool {
        let cleaned = clean_path(file);
        if self.tracked_files.iter().any(|f| clean_path(f) == cleaned) {
            return false;
        }
        self.tracked_files.push(cleaned);
        true
    }

    /// Whether `file` is already tracked
    pub fn is_tracked(&self, file: &str) -> bool {
        let cleaned = clean_path(file);
        self.tracked_files.iter().any(|f| clean_path(f) == cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = TraceConfig::load(&temp_dir.path().join(CONFIG_FILE)).unwrap();

        assert_eq!(config, TraceConfig::default());
        assert_eq!(config.tracked_files, vec![".env"]);
        assert!(config.backup_on_restore);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"tracked_files": ["a.env"], "default_branch": ""}"#).unwrap();

        let config = TraceConfig::load(&path).unwrap();
        assert_eq!(config.tracked_files, vec!["a.env"]);
        assert_eq!(config.default_branch, "main");
        assert!(config.backup_on_restore);
        assert!(config.hooks.is_empty());
    }

    #[test]
    fn test_blank_hooks_count_as_unset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"hooks": {"pre_restore": "", "post_restore": "  "}}"#,
        )
        .unwrap();

        let config = TraceConfig::load(&path).unwrap();
        assert_eq!(config.hooks.pre(), None);
        assert_eq!(config.hooks.post(), None);
        assert!(config.hooks.is_empty());

        let hooks = Hooks {
            pre_restore: Some("make env".to_string()),
            post_restore: None,
        };
        assert_eq!(hooks.pre(), Some("make env"));
    }

    #[test]
    fn test_malformed_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ nope").unwrap();

        let err = TraceConfig::load(&path).unwrap_err();
        assert!(matches!(err, TraceError::Parse { .. }));
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);

        let mut config = TraceConfig::init(&path).unwrap();
        config.backup_on_restore = false;
        config.hooks.pre_restore = Some("echo hi".to_string());
        config.save(&path).unwrap();

        let again = TraceConfig::init(&path).unwrap();
        assert!(!again.backup_on_restore);
        assert_eq!(again.hooks.pre_restore.as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_add_tracked_file_dedups() {
        let mut config = TraceConfig::default();
        assert!(!config.add_tracked_file("./.env"));
        assert!(config.add_tracked_file("config//app.env"));
        assert!(!config.add_tracked_file("config/app.env"));
        assert_eq!(config.tracked_files, vec![".env", "config/app.env"]);
        assert!(config.is_tracked("./config/app.env"));
    }
}
