//! Integration tests for envtrace
//!
//! Tests whole workflows through the public API: initializing a project,
//! snapshotting, drift detection, branching and restoring.

use ::envtrace::*;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Hook runner that records every command instead of running it
#[derive(Clone, Default)]
pub struct RecordingRunner {
    pub commands: Arc<Mutex<Vec<String>>>,
    pub fail_on: Option<String>,
}

impl HookRunner for RecordingRunner {
    fn run(&self, command: &str) -> Result<()> {
        self.commands.lock().push(command.to_string());
        if self.fail_on.as_deref() == Some(command) {
            return Err(TraceError::HookFailure {
                command: command.to_string(),
                reason: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Test project with a trace repository and a no-op hook runner
pub struct TraceTestHarness {
    pub temp_dir: TempDir,
    pub trace: Trace,
}

impl TraceTestHarness {
    /// Create a new, initialized project
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let trace = Trace::init(temp_dir.path())
            .unwrap()
            .with_hook_runner(NoOpHookRunner);
        Self { temp_dir, trace }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.root().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.root().join(path)).unwrap()
    }

    /// Rewrite the config and reopen the repository with `runner`
    pub fn reconfigure(&mut self, edit: impl FnOnce(&mut TraceConfig), runner: RecordingRunner) {
        let config_path = self.root().join(".trace").join(config::CONFIG_FILE);
        let mut config = TraceConfig::load(&config_path).unwrap();
        edit(&mut config);
        config.save(&config_path).unwrap();
        self.trace = Trace::open(self.root()).unwrap().with_hook_runner(runner);
    }
}

#[test]
fn test_empty_repository_has_branch_but_no_head() {
    let harness = TraceTestHarness::new();

    assert_eq!(harness.trace.head().unwrap(), None);
    assert_eq!(
        harness.trace.current_branch().unwrap(),
        Some(DEFAULT_BRANCH_NAME.to_string())
    );
    assert!(harness.trace.branches().unwrap().is_empty());
    assert!(harness.trace.log(None).unwrap().is_empty());
    assert!(matches!(
        harness.trace.resolve("HEAD"),
        Err(TraceError::NoCommitsYet)
    ));

    let status = harness.trace.status().unwrap();
    assert!(status.drift.is_none());
    assert!(!status.is_clean());
}

const DEFAULT_BRANCH_NAME: &str = config::DEFAULT_BRANCH;

#[test]
fn test_capture_env_file() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "KEY=VALUE\n");

    let snapshot = harness.trace.capture().unwrap();
    assert_eq!(
        snapshot.files[".env"],
        utils::hash_data("KEY=VALUE\n".as_bytes())
    );
    assert_eq!(snapshot.env_keys["KEY"], utils::hash_str("VALUE"));

    let commit = harness.trace.snap("first").unwrap();
    assert!(commit.parent.is_none());
    assert_eq!(commit.snapshot, snapshot);
    assert!(commit.verify_integrity());
    assert_eq!(harness.trace.head().unwrap(), Some(commit.hash));
}

#[test]
fn test_edit_shows_changed_key_and_modified_file() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "KEY=VALUE\n");
    let first = harness.trace.snap("first").unwrap();

    harness.write(".env", "KEY=OTHER\n");
    let drift = harness.trace.diff_working(Some(&first.hash)).unwrap();

    assert_eq!(drift.env.changed.iter().collect::<Vec<_>>(), vec!["KEY"]);
    assert!(drift.env.added.is_empty());
    assert!(drift.env.removed.is_empty());
    assert_eq!(drift.files.modified.iter().collect::<Vec<_>>(), vec![".env"]);

    let second = harness.trace.snap("second").unwrap();
    assert_eq!(second.parent.as_deref(), Some(first.hash.as_str()));
    let between = harness.trace.diff_commits(&first.hash, &second.hash).unwrap();
    assert_eq!(between, drift);
}

#[test]
fn test_create_branch_from_commit() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "KEY=VALUE\n");
    let commit = harness.trace.snap("first").unwrap();

    harness.trace.create_branch("feature").unwrap();

    let ref_file = harness.root().join(".trace/refs/heads/feature");
    assert_eq!(fs::read_to_string(ref_file).unwrap().trim(), commit.hash);
    assert_eq!(
        harness.trace.current_branch().unwrap(),
        Some("feature".to_string())
    );

    // New commits advance the attached branch only
    harness.write(".env", "KEY=FEATURE\n");
    let on_feature = harness.trace.snap("on feature").unwrap();
    assert_eq!(harness.trace.resolve("feature").unwrap(), on_feature.hash);
    assert_eq!(harness.trace.resolve("main").unwrap(), commit.hash);

    assert!(matches!(
        harness.trace.create_branch("feature"),
        Err(TraceError::BranchExists(_))
    ));
}

#[test]
fn test_restore_single_file_with_backup() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "KEY=VALUE\n");
    let old = harness.trace.snap("old").unwrap();
    harness.write(".env", "KEY=OTHER\n");
    harness.trace.snap("new").unwrap();

    let report = harness
        .trace
        .restore(RestoreOptions {
            target: Some(old.hash.clone()),
            selection: RestoreSelection::Paths(vec![
                ".env".to_string(),
                ".env.production".to_string(),
            ]),
            no_backup: false,
        })
        .unwrap();

    assert_eq!(report.commit_hash, old.hash);
    assert_eq!(report.restored, 1);
    assert_eq!(harness.read(".env"), "KEY=VALUE\n");

    let backup = report
        .outcomes
        .iter()
        .find_map(|outcome| match outcome {
            FileOutcome::Restored {
                backup: Some(backup),
                ..
            } => Some(backup.clone()),
            _ => None,
        })
        .expect("restored .env should have a backup");
    assert!(backup
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(".env.backup."));
    assert_eq!(fs::read_to_string(&backup).unwrap(), "KEY=OTHER\n");

    let skipped: Vec<_> = report.skipped().map(FileOutcome::path).collect();
    assert_eq!(skipped, vec![".env.production"]);
    assert!(!report.is_complete());
}

#[test]
fn test_restore_all_by_prefix_without_backup() {
    let mut harness = TraceTestHarness::new();
    harness.trace.track(&[".env.local", "config/app.env"]).unwrap();
    harness.write(".env", "A=1\n");
    harness.write(".env.local", "B=2\n");
    harness.write("config/app.env", "C=3\n");
    let commit = harness.trace.snap("three files").unwrap();

    fs::remove_file(harness.root().join(".env.local")).unwrap();
    harness.write(".env", "A=changed\n");
    harness.write("config/app.env", "C=changed\n");

    let report = harness
        .trace
        .restore(RestoreOptions {
            target: Some(commit.hash[..8].to_string()),
            no_backup: true,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(report.restored, 3);
    assert!(report.is_complete());
    assert_eq!(harness.read(".env.local"), "B=2\n");
    assert_eq!(harness.read("config/app.env"), "C=3\n");
    assert!(harness.trace.status().unwrap().is_clean());

    let backups = fs::read_dir(harness.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".backup."))
        .count();
    assert_eq!(backups, 0);
}

#[test]
fn test_restore_runs_hooks() {
    let mut harness = TraceTestHarness::new();
    let runner = RecordingRunner::default();
    harness.reconfigure(
        |config| {
            config.hooks.pre_restore = Some("echo before".to_string());
            config.hooks.post_restore = Some("echo after".to_string());
        },
        runner.clone(),
    );
    harness.write(".env", "A=1\n");
    harness.trace.snap("hooked").unwrap();

    let report = harness.trace.restore(Default::default()).unwrap();
    assert_eq!(report.post_hook, HookStatus::Succeeded);
    assert_eq!(
        *runner.commands.lock(),
        vec!["echo before".to_string(), "echo after".to_string()]
    );
}

#[test]
fn test_failing_pre_hook_aborts_restore() {
    let mut harness = TraceTestHarness::new();
    let runner = RecordingRunner {
        fail_on: Some("exit 1".to_string()),
        ..Default::default()
    };
    harness.reconfigure(
        |config| config.hooks.pre_restore = Some("exit 1".to_string()),
        runner.clone(),
    );
    harness.write(".env", "A=1\n");
    harness.trace.snap("hooked").unwrap();
    harness.write(".env", "A=2\n");

    let err = harness.trace.restore(Default::default()).unwrap_err();
    assert!(matches!(err, TraceError::HookFailure { .. }));
    assert_eq!(harness.read(".env"), "A=2\n");
}

#[test]
fn test_failing_post_hook_is_reported() {
    let mut harness = TraceTestHarness::new();
    let runner = RecordingRunner {
        fail_on: Some("exit 1".to_string()),
        ..Default::default()
    };
    harness.reconfigure(
        |config| config.hooks.post_restore = Some("exit 1".to_string()),
        runner,
    );
    harness.write(".env", "A=1\n");
    harness.trace.snap("hooked").unwrap();
    harness.write(".env", "A=2\n");

    let report = harness.trace.restore(Default::default()).unwrap();
    assert_eq!(report.restored, 1);
    assert!(matches!(report.post_hook, HookStatus::Failed(_)));
    assert_eq!(harness.read(".env"), "A=1\n");
}

#[test]
fn test_detached_head_commits_do_not_move_branches() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "A=1\n");
    let first = harness.trace.snap("first").unwrap();
    harness.write(".env", "A=2\n");
    let second = harness.trace.snap("second").unwrap();

    let head = harness.trace.checkout(&first.hash[..6]).unwrap();
    assert_eq!(head, Head::Detached(first.hash.clone()));
    assert_eq!(harness.trace.current_branch().unwrap(), None);

    harness.write(".env", "A=3\n");
    let detached = harness.trace.snap("detached work").unwrap();
    assert_eq!(detached.parent.as_deref(), Some(first.hash.as_str()));
    assert_eq!(harness.trace.head().unwrap(), Some(detached.hash));
    assert_eq!(harness.trace.resolve("main").unwrap(), second.hash);

    assert_eq!(
        harness.trace.checkout("main").unwrap(),
        Head::Attached("main".to_string())
    );
    assert_eq!(harness.trace.head().unwrap(), Some(second.hash));
}

#[test]
fn test_ignored_paths_are_never_captured() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".traceignore"), "*.secret\nprivate/\n").unwrap();
    let mut trace = Trace::init(temp_dir.path()).unwrap();

    let outcome = trace
        .track(&["keys.secret", "private/.env", ".env.local"])
        .unwrap();
    assert_eq!(outcome.added, vec![".env.local".to_string()]);
    assert_eq!(outcome.ignored.len(), 2);
    assert!(!trace.config().is_tracked("keys.secret"));
}

#[test]
fn test_discover_from_nested_directory() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "A=1\n");
    let commit = harness.trace.snap("root").unwrap();

    let nested = harness.root().join("src/deep/module");
    fs::create_dir_all(&nested).unwrap();
    let discovered = Trace::discover(&nested).unwrap();
    assert_eq!(discovered.head().unwrap(), Some(commit.hash));
}

#[test]
fn test_history_survives_reopen_and_verifies() {
    let harness = TraceTestHarness::new();
    for i in 0..5 {
        harness.write(".env", &format!("COUNTER={}\n", i));
        harness.trace.snap(&format!("commit {}", i)).unwrap();
    }

    let reopened = Trace::open(harness.root()).unwrap();
    let log = reopened.log(None).unwrap();
    assert_eq!(log.len(), 5);
    assert_eq!(log[0].message, "commit 4");
    assert!(log.last().unwrap().is_root());
    assert_eq!(reopened.log(Some(2)).unwrap().len(), 2);

    let report = reopened.verify_history().unwrap();
    assert!(report.is_valid(), "{}", report.summary());
    assert_eq!(report.total_commits, 5);
}

#[test]
fn test_tampered_blob_is_detected() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "A=1\n");
    let commit = harness.trace.snap("first").unwrap();

    let blob = harness
        .root()
        .join(".trace/objects/blobs")
        .join(&commit.snapshot.files[".env"]);
    fs::write(blob, "A=tampered\n").unwrap();

    let report = harness.trace.verify("HEAD").unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.blobs_valid, 0);
}

#[test]
fn test_identical_content_shares_one_blob() {
    let mut harness = TraceTestHarness::new();
    harness.trace.track(&[".env.copy"]).unwrap();
    harness.write(".env", "SAME=1\n");
    harness.write(".env.copy", "SAME=1\n");
    let commit = harness.trace.snap("dedup").unwrap();

    assert_eq!(
        commit.snapshot.files[".env"],
        commit.snapshot.files[".env.copy"]
    );
    let blobs = fs::read_dir(harness.root().join(".trace/objects/blobs"))
        .unwrap()
        .count();
    assert_eq!(blobs, 1);
}

#[test]
fn test_ambiguous_and_unknown_references() {
    let harness = TraceTestHarness::new();
    harness.write(".env", "A=1\n");
    harness.trace.snap("only").unwrap();

    assert!(matches!(
        harness.trace.resolve("does-not-exist"),
        Err(TraceError::NotFound { .. })
    ));
    assert!(matches!(
        harness.trace.resolve("../escape"),
        Err(TraceError::InvalidReference(_))
    ));
    assert!(matches!(
        harness.trace.resolve(""),
        Err(TraceError::InvalidReference(_))
    ));
}
