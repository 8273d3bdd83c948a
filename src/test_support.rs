//! Shared helpers for unit tests: scratch projects, git repos and a scripted
//! stand-in for the external LLM process.

use crate::approval::{ApprovalGate, Clock, SystemClock};
use crate::config::{AgentConfig, AgentSpec, Defaults, NotificationSettings, OperationSpec};
use crate::context::ProjectContext;
use crate::dispatch::{CancelToken, Dispatcher, Ended, Invocation, LlmProcess, ProcessOutput};
use crate::error::Result;
use crate::notify::Notifier;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// What the stub process does when invoked.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Exit 0 and print the instruction back prefixed with this text.
    Echo(&'static str),
    /// Exit with `code` and write `stderr`.
    Fail { code: i32, stderr: &'static str },
    /// Run until the timeout or cancellation.
    Hang,
}

/// An `LlmProcess` that records every invocation and follows a script.
#[derive(Debug)]
pub(crate) struct StubProcess {
    script: Script,
    calls: Mutex<Vec<Invocation>>,
}

impl StubProcess {
    pub(crate) fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl LlmProcess for StubProcess {
    fn invoke(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let start = Instant::now();

        let (exit_code, stdout, stderr, ended) = match &self.script {
            Script::Echo(prefix) => (
                Some(0),
                format!("{}{}", prefix, invocation.instruction),
                String::new(),
                Ended::Exited,
            ),
            Script::Fail { code, stderr } => {
                (Some(*code), String::new(), stderr.to_string(), Ended::Exited)
            }
            Script::Hang => loop {
                if cancel.is_cancelled() {
                    break (None, String::new(), String::new(), Ended::Cancelled);
                }
                if start.elapsed() >= invocation.timeout {
                    break (None, String::new(), String::new(), Ended::TimedOut);
                }
                std::thread::sleep(Duration::from_millis(10));
            },
        };

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
            duration: start.elapsed(),
            ended,
        })
    }
}

/// A spec with two operations, one of them dangerous.
pub(crate) fn sample_spec() -> AgentSpec {
    let mut spec = AgentSpec::new("Quinn", "Network Engineer");
    spec.system_prompt = "You are Quinn, a network engineer.".to_string();
    spec.timeout_seconds = Some(1);
    spec.operations.insert(
        "design-network".to_string(),
        OperationSpec::new("Design a network", "Design a {topology} network for {app}"),
    );
    spec.operations.insert(
        "deploy".to_string(),
        OperationSpec::new("Deploy containers", "Deploy {service} to {env}").dangerous(),
    );
    spec.operations.insert(
        "inspect".to_string(),
        OperationSpec::new("Read-only inspection", "Inspect {target}").with_tools(&["Read"]),
    );
    spec
}

pub(crate) fn agent_config(root: &Path, spec: AgentSpec) -> AgentConfig {
    AgentConfig::new(
        &crate::context::slug(&spec.name),
        spec,
        &Defaults::default(),
        root,
        Some("git@example.com:team/app.git".to_string()),
    )
    .unwrap()
}

pub(crate) fn notifier_for(root: &Path, agent: &str) -> Arc<Notifier> {
    let ctx = ProjectContext::at(root).unwrap();
    Arc::new(Notifier::new(
        agent,
        &NotificationSettings::default(),
        &ctx.notification_log_path(),
    ))
}

/// A dispatcher over `process` with a short approval timeout.
pub(crate) fn dispatcher(
    root: &Path,
    spec: AgentSpec,
    process: Arc<dyn LlmProcess>,
    approval_timeout: Duration,
    clock: Option<Arc<dyn Clock>>,
) -> Dispatcher {
    let config = agent_config(root, spec);
    let notifier = notifier_for(root, config.name());
    let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
    let gate = ApprovalGate::new(config.name(), approval_timeout, clock, Arc::clone(&notifier))
        .with_poll_interval(Duration::from_millis(10));
    Dispatcher::new(config, process, Arc::new(gate), notifier)
}

/// Lines of the project's notification log.
pub(crate) fn log_lines(root: &Path) -> Vec<String> {
    let path = ProjectContext::at(root).unwrap().notification_log_path();
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

/// A git repository with one commit on `main`.
pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    // Deterministic default branch name across environments.
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

pub(crate) fn git(repo_dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
