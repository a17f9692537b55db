//! Main test module for envtrace
//!
//! This module includes all test suites:
//! - Integration tests for end-to-end repository workflows
//! - Property-based tests for diff, storage and hashing invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::envtrace::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let trace = Trace::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(".env"), "").unwrap();

        let commit = trace.snap("empty").unwrap();
        assert_eq!(commit.snapshot.files.len(), 1);
        assert!(commit.snapshot.env_keys.is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let trace = Trace::init(temp_dir.path()).unwrap();
        fs::write(
            temp_dir.path().join(".env"),
            "# database\n\n  DB_URL = postgres://localhost \n=orphan\nnot a pair\n",
        )
        .unwrap();

        let commit = trace.snap("parsed").unwrap();
        let keys: Vec<_> = commit.snapshot.env_keys.keys().cloned().collect();
        assert_eq!(keys, vec!["DB_URL"]);
        assert_eq!(
            commit.snapshot.env_keys["DB_URL"],
            utils::hash_str("postgres://localhost")
        );
    }

    #[test]
    fn test_untracked_missing_file_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let trace = Trace::init(temp_dir.path()).unwrap();

        // .env is tracked by default but does not exist yet
        let commit = trace.snap("nothing here").unwrap();
        assert!(commit.snapshot.is_empty());
        assert!(commit.is_root());
    }

    #[test]
    fn test_value_with_equals_sign() {
        let temp_dir = TempDir::new().unwrap();
        let trace = Trace::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(".env"), "TOKEN=a=b=c\n").unwrap();

        let commit = trace.snap("equals").unwrap();
        assert_eq!(commit.snapshot.env_keys["TOKEN"], utils::hash_str("a=b=c"));
    }

    #[test]
    fn test_secret_values_never_reach_commit_files() {
        let temp_dir = TempDir::new().unwrap();
        let trace = Trace::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(".env"), "API_KEY=super-secret-value\n").unwrap();

        let commit = trace.snap("secret").unwrap();
        let commit_file = temp_dir
            .path()
            .join(".trace/objects/commits")
            .join(format!("{}.json", commit.hash));
        let stored = fs::read_to_string(commit_file).unwrap();
        assert!(stored.contains("API_KEY"));
        assert!(!stored.contains("super-secret-value"));
    }
}
