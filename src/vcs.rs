//! Version control collaborator used after successful operations.
//!
//! Git is driven as an opaque command. Failures carry `anyhow` context and
//! are turned into a note on the task output by the caller, never into a
//! failed task.

use anyhow::{Context, bail};
use std::path::Path;
use std::process::Command;

/// Stages and commits work in a project.
pub trait Vcs: Send + Sync {
    /// Commit every change under `repo` with `message`.
    ///
    /// Returns the short id of the new commit, or `None` if there was nothing
    /// to commit.
    fn commit_all(&self, repo: &Path, message: &str) -> anyhow::Result<Option<String>>;
}

/// The `git` command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl Vcs for Git {
    fn commit_all(&self, repo: &Path, message: &str) -> anyhow::Result<Option<String>> {
        if !is_repo(repo) {
            bail!("'{}' is not inside a git repository", repo.display());
        }
        if !has_changes(repo)? {
            return Ok(None);
        }
        run_git(repo, &["add", "-A"])?;
        run_git(repo, &["commit", "-m", message])?;
        let sha = run_git(repo, &["rev-parse", "--short", "HEAD"])?;
        Ok(Some(sha))
    }
}

/// Run git in `cwd` and return trimmed stdout.
pub fn run_git(cwd: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute git {}", args.first().unwrap_or(&"")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        bail!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            output.status.code().unwrap_or(-1),
            if stderr.is_empty() { &stdout } else { &stderr }
        );
    }
    Ok(stdout)
}

pub fn is_repo(cwd: &Path) -> bool {
    run_git(cwd, &["rev-parse", "--is-inside-work-tree"]).is_ok_and(|out| out == "true")
}

/// Whether the working tree has staged, unstaged or untracked changes.
pub fn has_changes(cwd: &Path) -> anyhow::Result<bool> {
    let status =
        run_git(cwd, &["status", "--porcelain"]).context("failed to read working tree status")?;
    Ok(!status.is_empty())
}
