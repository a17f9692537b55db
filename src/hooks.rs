//! Restore hooks
//!
//! Hook commands come from the repository config and run before and after a
//! restore. The engine only needs to know whether a command succeeded, so
//! execution sits behind the [`HookRunner`] trait and can be swapped out in
//! tests or by embedders.

use crate::error::{Result, TraceError};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// Runs a hook command and reports success or failure
pub trait HookRunner: Send + Sync {
    /// Run `command`, failing with [`TraceError::HookFailure`] if it does not
    /// exit successfully
    fn run(&self, command: &str) -> Result<()>;
}

/// Runs hooks through the platform shell
///
/// Standard streams are inherited so hook output reaches the user directly.
#[derive(Debug, Clone, Default)]
pub struct ShellHookRunner {
    working_dir: Option<PathBuf>,
}

impl ShellHookRunner {
    /// Runner that executes in the current directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that executes in `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    fn shell_command(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

impl HookRunner for ShellHookRunner {
    fn run(&self, command: &str) -> Result<()> {
        debug!("Running hook: {}", command);

        let mut cmd = Self::shell_command(command);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| TraceError::HookFailure {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        if status.success() {
            Ok(())
        } else {
            warn!("Hook '{}' exited with {}", command, status);
            Err(TraceError::HookFailure {
                command: command.to_string(),
                reason: status.to_string(),
            })
        }
    }
}

/// Hook runner that accepts every command without running it
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHookRunner;

impl HookRunner for NoOpHookRunner {
    fn run(&self, _command: &str) -> Result<()> {
        Ok(())
    }
}
