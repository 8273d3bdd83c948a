//! Project context resolution for roster.
//!
//! Every command resolves one `ProjectContext` up front; all state roster
//! keeps (notification log, approval mailbox, transient run output, agent
//! config) lives under the fixed `.roster/` directory of the project root.

use crate::error::{Result, RosterError};
use std::env;
use std::path::{Path, PathBuf};

/// State directory relative to the project root.
pub const STATE_DIR: &str = ".roster";

/// Agent configuration file name inside the state directory.
pub const AGENTS_FILE: &str = "agents.yaml";

/// Environment variable that overrides the project root.
pub const PROJECT_ROOT_ENV: &str = "ROSTER_PROJECT_ROOT";

/// Resolved paths for a roster project. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    /// Root of the project the agents work in.
    pub project_root: PathBuf,

    /// `{project_root}/.roster/`
    pub state_dir: PathBuf,
}

impl ProjectContext {
    /// Resolve the context from an explicit root, `ROSTER_PROJECT_ROOT`, or the
    /// current working directory, in that order.
    pub fn resolve(explicit_root: Option<&Path>) -> Result<Self> {
        if let Some(root) = explicit_root {
            return Self::at(root);
        }
        if let Ok(root) = env::var(PROJECT_ROOT_ENV)
            && !root.is_empty()
        {
            return Self::at(root);
        }
        let cwd = env::current_dir()
            .map_err(|e| RosterError::io("failed to get current working directory", e))?;
        Self::at(cwd)
    }

    /// Build a context rooted at `root`.
    ///
    /// Relative roots are made absolute against the current directory; the
    /// root itself is not required to exist.
    pub fn at<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let project_root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            env::current_dir()
                .map_err(|e| RosterError::io("failed to get current working directory", e))?
                .join(root)
        };
        let state_dir = project_root.join(STATE_DIR);
        Ok(Self {
            project_root,
            state_dir,
        })
    }

    /// `.roster/agents.yaml`
    pub fn agents_config_path(&self) -> PathBuf {
        self.state_dir.join(AGENTS_FILE)
    }

    /// `.roster/logs/`
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// `.roster/logs/notifications.log`
    pub fn notification_log_path(&self) -> PathBuf {
        self.logs_dir().join("notifications.log")
    }

    /// `.roster/approvals/`
    pub fn approvals_dir(&self) -> PathBuf {
        self.state_dir.join("approvals")
    }

    /// `.roster/runs/{agent}/{run_id}/`
    pub fn run_dir(&self, agent: &str, run_id: &str) -> PathBuf {
        self.state_dir
            .join("runs")
            .join(slug(agent))
            .join(run_id)
    }
}

/// Lowercase an agent name into a path- and CLI-safe identifier.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::DirGuard;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn paths_hang_off_state_dir() {
        let temp = TempDir::new().unwrap();
        let ctx = ProjectContext::at(temp.path()).unwrap();

        assert_eq!(ctx.project_root, temp.path());
        assert_eq!(ctx.state_dir, temp.path().join(".roster"));
        assert_eq!(
            ctx.notification_log_path(),
            temp.path().join(".roster/logs/notifications.log")
        );
        assert_eq!(
            ctx.agents_config_path(),
            temp.path().join(".roster/agents.yaml")
        );
        assert_eq!(ctx.approvals_dir(), temp.path().join(".roster/approvals"));
        assert_eq!(
            ctx.run_dir("Quinn", "r1"),
            temp.path().join(".roster/runs/quinn/r1")
        );
    }

    #[test]
    #[serial]
    fn explicit_root_wins_over_env() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        // SAFETY: serialized with other env-mutating tests.
        unsafe { env::set_var(PROJECT_ROOT_ENV, b.path()) };

        let ctx = ProjectContext::resolve(Some(a.path())).unwrap();
        assert_eq!(ctx.project_root, a.path());

        let ctx = ProjectContext::resolve(None).unwrap();
        assert_eq!(ctx.project_root, b.path());

        unsafe { env::remove_var(PROJECT_ROOT_ENV) };
    }

    #[test]
    #[serial]
    fn falls_back_to_current_dir() {
        let temp = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp.path());
        unsafe { env::remove_var(PROJECT_ROOT_ENV) };

        let ctx = ProjectContext::resolve(None).unwrap();
        assert_eq!(
            ctx.project_root.canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );

        let relative = ProjectContext::at("sub").unwrap();
        assert_eq!(relative.project_root, ctx.project_root.join("sub"));
    }

    #[test]
    fn slug_normalizes_names() {
        assert_eq!(slug("Quinn"), "quinn");
        assert_eq!(slug("Backend Engineer"), "backend-engineer");
        assert_eq!(slug("  QA / Test  "), "qa-test");
        assert_eq!(slug("brett-jr"), "brett-jr");
    }
}
