//! # trace - version control for your environment
//!
//! Command-line interface for the envtrace library.
//!
//! ## Usage
//! ```bash
//! # Start tracking .env in the current project
//! trace init
//!
//! # Record the current environment
//! trace snap "working local setup"
//!
//! # See what drifted since the last snapshot
//! trace status
//!
//! # Go back to a known-good state
//! trace restore --commit a1b2c3d .env
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use envtrace::{
    Commit, Drift, Head, RestoreOptions, RestoreReport, RestoreSelection, Trace, TraceError,
};
use envtrace::restore::{FileOutcome, HookStatus};
use envtrace::utils::short_hash;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// trace - snapshots, drift detection and restore for .env files
#[derive(Parser)]
#[command(name = "trace")]
#[command(version)]
#[command(about = "Git-like history for your environment files")]
#[command(long_about = None)]
struct Cli {
    /// Project directory (defaults to discovering from the current directory)
    #[arg(short = 'C', long, global = true)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a trace repository in the project directory
    Init,

    /// Record the current state of tracked files
    Snap {
        /// Commit message
        message: String,

        /// Skip the commit when nothing changed since HEAD
        #[arg(long)]
        if_changed: bool,
    },

    /// Show drift from HEAD
    #[command(alias = "st")]
    Status,

    /// Compare a commit with the working files, or two commits
    Diff {
        /// Commit, branch or prefix to compare (defaults to HEAD)
        target: Option<String>,

        /// Compare against this commit instead of the working files
        #[arg(long)]
        to: Option<String>,
    },

    /// Show commit history from HEAD
    Log {
        /// Show at most this many commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List, create or delete branches
    Branch {
        /// Branch to create (or delete with -d)
        name: Option<String>,

        /// Delete the named branch
        #[arg(short, long, requires = "name")]
        delete: bool,
    },

    /// Move HEAD to a branch or commit
    #[command(alias = "co")]
    Checkout {
        /// Branch name, commit hash or prefix
        reference: String,
    },

    /// Write files from a commit back into the project
    #[command(alias = "rs")]
    Restore {
        /// Files to restore (defaults to every file in the commit)
        files: Vec<String>,

        /// Commit to restore from (defaults to HEAD)
        #[arg(short, long)]
        commit: Option<String>,

        /// Do not back up files before overwriting them
        #[arg(long)]
        no_backup: bool,
    },

    /// Add files to the tracked list
    Track {
        /// Paths relative to the project root
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Check commit and blob integrity
    Verify {
        /// Commit to verify (defaults to the whole history)
        reference: Option<String>,
    },

    /// Re-check drift on an interval
    Watch {
        /// Poll interval, e.g. "2s" or "500ms"
        #[arg(short, long, default_value = "2s", value_parser = humantime::parse_duration)]
        interval: Duration,

        /// Commit automatically whenever something changes
        #[arg(long)]
        auto_snap: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        match e.downcast_ref::<TraceError>() {
            Some(err) => eprintln!("{}: {}", "Error".red().bold(), err.user_message()),
            None => eprintln!("{}: {:#}", "Error".red().bold(), e),
        }
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init = cli.command {
        return cmd_init(cli.path);
    }

    let mut trace = open_trace(cli.path)?;
    match cli.command {
        Commands::Init => Ok(()),
        Commands::Snap { message, if_changed } => cmd_snap(&trace, &message, if_changed),
        Commands::Status => cmd_status(&trace),
        Commands::Diff { target, to } => cmd_diff(&trace, target, to),
        Commands::Log { limit } => cmd_log(&trace, limit),
        Commands::Branch { name, delete } => cmd_branch(&trace, name, delete),
        Commands::Checkout { reference } => cmd_checkout(&trace, &reference),
        Commands::Restore {
            files,
            commit,
            no_backup,
        } => cmd_restore(&trace, files, commit, no_backup),
        Commands::Track { files } => cmd_track(&mut trace, &files),
        Commands::Verify { reference } => cmd_verify(&trace, reference),
        Commands::Watch {
            interval,
            auto_snap,
        } => cmd_watch(&trace, interval, auto_snap),
    }
}

fn open_trace(path: Option<PathBuf>) -> anyhow::Result<Trace> {
    let trace = match path {
        Some(path) => Trace::open(path)?,
        None => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            Trace::discover(cwd)?
        }
    };
    Ok(trace)
}

/// Initialize a repository
///
/// Creates `.trace/` with the object store, refs, logs and a default config
/// tracking `.env`.
fn cmd_init(path: Option<PathBuf>) -> anyhow::Result<()> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir().context("cannot read current directory")?,
    };
    let trace = Trace::init(&root)?;
    let config = trace.config();

    println!(
        "{} Initialized empty trace repository in {}",
        "✓".green().bold(),
        root.join(".trace").display().to_string().cyan()
    );
    println!("  Branch: {}", config.default_branch.cyan());
    println!("  Tracking: {}", config.tracked_files.join(", ").cyan());
    println!(
        "\nNext: {}",
        "trace snap \"initial state\"".yellow()
    );
    Ok(())
}

/// Create a commit from the current state
fn cmd_snap(trace: &Trace, message: &str, if_changed: bool) -> anyhow::Result<()> {
    let spinner = spinner("Capturing tracked files...");
    let start = Instant::now();

    let result = if if_changed {
        trace.snap_if_changed(message)?
    } else {
        Some(trace.snap(message)?)
    };
    spinner.finish_and_clear();

    let Some(commit) = result else {
        println!("{} Nothing changed since HEAD, no commit created", "✓".green());
        return Ok(());
    };

    println!(
        "{} Committed {}",
        "✓".green().bold(),
        commit.short_hash().yellow().bold()
    );
    println!("  Message: {}", commit.message.cyan());
    println!("  Files: {}", commit.snapshot.files.len().to_string().cyan());
    println!(
        "  Env keys: {}",
        commit.snapshot.env_keys.len().to_string().cyan()
    );
    println!(
        "  Time: {}",
        humantime::format_duration(truncate_millis(start.elapsed()))
            .to_string()
            .cyan()
    );
    Ok(())
}

/// Show where HEAD is and what drifted
fn cmd_status(trace: &Trace) -> anyhow::Result<()> {
    let status = trace.status()?;

    match (&status.branch, &status.head) {
        (Some(branch), _) => println!("On branch {}", branch.cyan()),
        (None, Some(head)) => println!("HEAD detached at {}", short_hash(head).yellow()),
        (None, None) => {}
    }

    match &status.drift {
        None => {
            println!("\nNo commits yet.");
            println!("  (use \"trace snap <message>\" to create your first commit)");
        }
        Some(drift) if drift.is_empty() => {
            println!("\n{} Nothing to commit, working environment clean", "✨".green());
        }
        Some(drift) => {
            println!("\nChanges not committed:");
            println!("  (use \"trace snap <message>\" to commit)\n");
            print!("{}", render_drift(drift));
        }
    }
    Ok(())
}

/// Compare commits or a commit with the working files
fn cmd_diff(trace: &Trace, target: Option<String>, to: Option<String>) -> anyhow::Result<()> {
    let from = target.as_deref().unwrap_or("HEAD");

    let drift = match &to {
        Some(to) => {
            let drift = trace.diff_commits(from, to)?;
            println!(
                "Comparing {} → {}\n",
                short_hash(&trace.resolve(from)?).yellow(),
                short_hash(&trace.resolve(to)?).yellow()
            );
            drift
        }
        None => {
            let drift = trace.diff_working(Some(from))?;
            println!(
                "Comparing {} → working files\n",
                short_hash(&trace.resolve(from)?).yellow()
            );
            drift
        }
    };

    if drift.is_empty() {
        println!("{} No drift detected", "✨".green());
    } else {
        print!("{}", render_drift(&drift));
    }
    Ok(())
}

/// Show history from HEAD
fn cmd_log(trace: &Trace, limit: Option<usize>) -> anyhow::Result<()> {
    let history = trace.log(limit)?;
    if history.is_empty() {
        println!("No commits yet.");
        return Ok(());
    }

    let head = trace.head()?;
    let branch = trace.current_branch()?;
    for commit in &history {
        print_commit(commit, head.as_deref(), branch.as_deref());
    }
    Ok(())
}

fn print_commit(commit: &Commit, head: Option<&str>, branch: Option<&str>) {
    let mut decoration = String::new();
    if head == Some(commit.hash.as_str()) {
        decoration = match branch {
            Some(branch) => format!(" (HEAD -> {})", branch),
            None => " (HEAD)".to_string(),
        };
    }

    println!(
        "{} {}{}",
        "commit".yellow(),
        commit.hash.yellow(),
        decoration.cyan().bold()
    );
    println!(
        "Date:   {}",
        commit.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Stats:  {} files, {} env keys",
        commit.snapshot.files.len(),
        commit.snapshot.env_keys.len()
    );
    println!("\n    {}\n", commit.message);
}

/// List, create or delete branches
fn cmd_branch(trace: &Trace, name: Option<String>, delete: bool) -> anyhow::Result<()> {
    match (name, delete) {
        (Some(name), true) => {
            trace.delete_branch(&name)?;
            println!("{} Deleted branch {}", "✓".green().bold(), name.cyan());
        }
        (Some(name), false) => {
            trace.create_branch(&name)?;
            println!(
                "{} Switched to a new branch {}",
                "✓".green().bold(),
                name.cyan()
            );
        }
        (None, _) => {
            let current = trace.current_branch()?;
            let branches = trace.branches()?;
            if branches.is_empty() {
                if let Some(current) = current {
                    println!("* {} {}", current.green(), "(no commits)".dimmed());
                }
                return Ok(());
            }
            for branch in branches {
                if current.as_deref() == Some(branch.as_str()) {
                    println!("* {}", branch.green());
                } else {
                    println!("  {}", branch);
                }
            }
        }
    }
    Ok(())
}

/// Move HEAD
fn cmd_checkout(trace: &Trace, reference: &str) -> anyhow::Result<()> {
    match trace.checkout(reference)? {
        Head::Attached(branch) => {
            println!("{} Switched to branch {}", "✓".green().bold(), branch.cyan());
        }
        Head::Detached(hash) => {
            println!(
                "{} HEAD is now detached at {}",
                "✓".green().bold(),
                short_hash(&hash).yellow()
            );
        }
        Head::Empty => {}
    }
    println!(
        "  Working files are unchanged; run {} to apply this state.",
        "trace restore".yellow()
    );
    Ok(())
}

/// Restore files from a commit
fn cmd_restore(
    trace: &Trace,
    files: Vec<String>,
    commit: Option<String>,
    no_backup: bool,
) -> anyhow::Result<()> {
    let selection = if files.is_empty() {
        RestoreSelection::All
    } else {
        RestoreSelection::Paths(files)
    };

    let report = trace.restore(RestoreOptions {
        target: commit,
        selection,
        no_backup,
    })?;
    print_restore_report(&report);
    Ok(())
}

fn print_restore_report(report: &RestoreReport) {
    if report.cancelled {
        println!("No files selected. Restore cancelled.");
        return;
    }

    println!(
        "{} {}",
        "Restoring from commit".blue().bold(),
        short_hash(&report.commit_hash).yellow()
    );

    for outcome in &report.outcomes {
        match outcome {
            FileOutcome::Restored { path, backup } => {
                println!("  {} {}", "✓".green(), path);
                if let Some(backup) = backup {
                    println!("    Backup: {}", backup.display().to_string().dimmed());
                }
            }
            FileOutcome::Skipped { path, reason } => {
                println!("  {} {} ({})", "⚠".yellow(), path, reason);
            }
            FileOutcome::Failed { path, reason } => {
                println!("  {} {}: {}", "✗".red(), path, reason);
            }
        }
    }

    if let HookStatus::Failed(reason) = &report.post_hook {
        println!("  {} post-restore hook failed: {}", "⚠".yellow(), reason);
    }

    println!(
        "\n{} Restored {} file(s)",
        "✓".green().bold(),
        report.restored.to_string().cyan()
    );
}

/// Add files to the tracked list
fn cmd_track(trace: &mut Trace, files: &[String]) -> anyhow::Result<()> {
    let outcome = trace.track(files)?;

    for path in &outcome.added {
        println!("  {} {}", "+".green(), path);
    }
    for path in &outcome.already_tracked {
        println!("  {} {} (already tracked)", "=".dimmed(), path);
    }
    for path in &outcome.ignored {
        println!("  {} Skipping {} (ignored by .traceignore)", "⚠".yellow(), path);
    }

    if outcome.changed() {
        println!("\nUpdated {}", ".trace/config.json".cyan());
    }
    Ok(())
}

/// Verify one commit or the whole history
fn cmd_verify(trace: &Trace, reference: Option<String>) -> anyhow::Result<()> {
    let spinner = spinner("Verifying...");

    let (valid, summary, errors) = match reference {
        Some(reference) => {
            let report = trace.verify(&reference)?;
            (report.is_valid(), report.summary(), report.errors)
        }
        None => {
            let report = trace.verify_history()?;
            let errors = report
                .commit_reports
                .iter()
                .flat_map(|r| {
                    r.errors
                        .iter()
                        .map(move |e| format!("{}: {}", short_hash(&r.commit_hash), e))
                })
                .collect();
            (report.is_valid(), report.summary(), errors)
        }
    };
    spinner.finish_and_clear();

    if valid {
        println!("{} {}", "✓".green().bold(), summary);
        return Ok(());
    }

    println!("{} {}", "✗".red().bold(), summary);
    for error in &errors {
        println!("  {}", error.red());
    }
    anyhow::bail!("verification failed")
}

/// Poll status and re-render when the output changes
fn cmd_watch(trace: &Trace, interval: Duration, auto_snap: bool) -> anyhow::Result<()> {
    println!(
        "👀 Watching for changes every {}... (Ctrl+C to stop)",
        humantime::format_duration(interval)
    );

    let mut last_output = String::new();
    loop {
        match watch_tick(trace, auto_snap) {
            Ok(output) if output != last_output => {
                // Clear screen and redraw
                print!("\x1b[2J\x1b[H{}", output);
                last_output = output;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("watch check failed: {}", e),
        }
        std::thread::sleep(interval);
    }
}

fn watch_tick(trace: &Trace, auto_snap: bool) -> envtrace::Result<String> {
    let mut output = String::new();

    if auto_snap {
        let message = format!("auto: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"));
        if let Some(commit) = trace.snap_if_changed(&message)? {
            let _ = writeln!(
                output,
                "{} Auto-committed {}\n",
                "✓".green(),
                commit.short_hash().yellow()
            );
        }
    }

    let status = trace.status()?;
    let _ = writeln!(output, "{}", status.location());
    match &status.drift {
        None => {
            let _ = writeln!(output, "No commits yet.");
        }
        Some(drift) if drift.is_empty() => {
            let _ = writeln!(output, "{} Environment clean", "✨".green());
        }
        Some(drift) => {
            let _ = writeln!(output, "Changes not committed:\n");
            output.push_str(&render_drift(drift));
        }
    }
    Ok(output)
}

/// Render a drift as colored text, files first, in key order
fn render_drift(drift: &Drift) -> String {
    let mut out = String::new();

    if !drift.files.is_empty() {
        let _ = writeln!(out, "{}", "Files:".bold());
        for path in &drift.files.added {
            let _ = writeln!(out, "  {} {}", "added:   ".green(), path);
        }
        for path in &drift.files.modified {
            let _ = writeln!(out, "  {} {}", "modified:".yellow(), path);
        }
        for path in &drift.files.removed {
            let _ = writeln!(out, "  {} {}", "removed: ".red(), path);
        }
        out.push('\n');
    }

    if !drift.env.is_empty() {
        let _ = writeln!(out, "{}", "Environment keys:".bold());
        for key in &drift.env.added {
            let _ = writeln!(out, "  {} {}", "+".green(), key);
        }
        for key in &drift.env.changed {
            let _ = writeln!(out, "  {} {}", "~".yellow(), key);
        }
        for key in &drift.env.removed {
            let _ = writeln!(out, "  {} {}", "-".red(), key);
        }
        out.push('\n');
    }

    out
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn truncate_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
