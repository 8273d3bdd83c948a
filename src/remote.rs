//! Remote repository collaborator for issue-bound operations.
//!
//! The `gh` CLI is driven as an opaque command, like git in `vcs`. Fetching
//! the issue is required before an issue-bound operation runs; labels and
//! comments are best effort and the caller turns their failures into notes.

use anyhow::{Context, bail};
use serde::Deserialize;
use std::process::Command;

/// Variables an issue-bound operation gets from the fetched issue.
pub const ISSUE_VARS: &[&str] = &["issue_title", "issue_body", "issue_url"];

/// Label added to an issue while an agent works on it.
pub const IN_PROGRESS_LABEL: &str = "in-progress";

/// The fields of an issue an operation can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub labels: Vec<String>,
    pub url: String,
}

/// Issue tracking on the project's remote repository.
pub trait Remote: Send + Sync {
    fn issue(&self, repo: &str, number: u64) -> anyhow::Result<Issue>;

    fn add_label(&self, repo: &str, number: u64, label: &str) -> anyhow::Result<()>;

    fn comment(&self, repo: &str, number: u64, body: &str) -> anyhow::Result<()>;
}

/// The GitHub CLI.
#[derive(Debug, Clone)]
pub struct GitHub {
    program: String,
}

impl Default for GitHub {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
        }
    }
}

impl GitHub {
    #[cfg(test)]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `gh <args> --repo <repo>` and return trimmed stdout.
    fn run(&self, repo: &str, args: &[&str]) -> anyhow::Result<String> {
        let slug = repo_slug(repo);
        let output = Command::new(&self.program)
            .args(args)
            .args(["--repo", slug.as_str()])
            .output()
            .with_context(|| {
                format!(
                    "failed to execute {} {}",
                    self.program,
                    args.first().unwrap_or(&"")
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            bail!(
                "{} {} failed (exit code {}): {}",
                self.program,
                args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
                output.status.code().unwrap_or(-1),
                if stderr.is_empty() { &stdout } else { &stderr }
            );
        }
        Ok(stdout)
    }
}

impl Remote for GitHub {
    fn issue(&self, repo: &str, number: u64) -> anyhow::Result<Issue> {
        let number = number.to_string();
        let json = self.run(
            repo,
            &[
                "issue",
                "view",
                &number,
                "--json",
                "number,title,body,state,labels,url",
            ],
        )?;
        parse_issue(&json)
    }

    fn add_label(&self, repo: &str, number: u64, label: &str) -> anyhow::Result<()> {
        let number = number.to_string();
        self.run(repo, &["issue", "edit", &number, "--add-label", label])?;
        Ok(())
    }

    fn comment(&self, repo: &str, number: u64, body: &str) -> anyhow::Result<()> {
        let number = number.to_string();
        self.run(repo, &["issue", "comment", &number, "--body", body])?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct IssueJson {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    labels: Vec<LabelJson>,
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
struct LabelJson {
    name: String,
}

/// Parse the output of `gh issue view --json ...`.
pub fn parse_issue(json: &str) -> anyhow::Result<Issue> {
    let raw: IssueJson = serde_json::from_str(json).context("failed to parse issue JSON")?;
    Ok(Issue {
        number: raw.number,
        title: raw.title,
        body: raw.body.unwrap_or_default(),
        state: raw.state,
        labels: raw.labels.into_iter().map(|l| l.name).collect(),
        url: raw.url,
    })
}

/// The `--repo` value for a configured remote.
///
/// `git@host:owner/name.git` becomes `host/owner/name`; URL schemes and a
/// trailing `.git` are dropped; `owner/name` passes through.
pub fn repo_slug(remote: &str) -> String {
    let remote = remote.trim();
    let remote = remote.strip_suffix(".git").unwrap_or(remote);
    if let Some((_, rest)) = remote.split_once("://") {
        let rest = rest.rsplit_once('@').map_or(rest, |(_, host_path)| host_path);
        return rest.trim_end_matches('/').to_string();
    }
    if let Some((user_host, path)) = remote.split_once(':') {
        let host = user_host.rsplit_once('@').map_or(user_host, |(_, h)| h);
        return format!("{}/{}", host, path.trim_matches('/'));
    }
    remote.to_string()
}

/// Parse an issue number given as `42` or `#42`.
pub fn issue_number(value: &str) -> Option<u64> {
    value.trim().trim_start_matches('#').parse().ok()
}
