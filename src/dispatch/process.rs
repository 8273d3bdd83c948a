//! The external LLM process capability and its command-backed implementation.
//!
//! The dispatcher only sees [`LlmProcess`]. [`CommandProcess`] launches the
//! configured runner with:
//!
//! - Per-argument template substitution (arguments are split with shell
//!   quoting rules before rendering, so values never change word boundaries)
//! - Output capture to `.roster/runs/<agent>/<run-id>/{stdout,stderr}.log`,
//!   removed again once the output has been read
//! - A timeout and a cancel flag, both of which kill the process

use super::cancel::CancelToken;
use crate::config::{PermissionMode, RunnerSettings};
use crate::context::ProjectContext;
use crate::error::{Result, RosterError};
use crate::policy::Restrictions;
use crate::template;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Everything one invocation of the external process needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub agent: String,
    pub run_id: String,
    pub instruction: String,
    pub system_prompt: String,
    pub restrictions: Restrictions,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub model: Option<String>,
    pub permission_mode: PermissionMode,
}

/// How the process stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ended {
    Exited,
    TimedOut,
    Cancelled,
}

/// Captured result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` if the process was killed or ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub ended: Ended,
}

impl ProcessOutput {
    pub fn is_success(&self) -> bool {
        self.ended == Ended::Exited && self.exit_code == Some(0)
    }
}

/// Runs an instruction through an external LLM process.
///
/// `Err` means the process could not be started at all.
pub trait LlmProcess: Send + Sync {
    fn invoke(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ProcessOutput>;
}

/// Arguments dropped, together with a preceding `--flag`, when they render empty.
const OPTIONAL_ARGS: &[&str] = &["{model}", "{disallowed_tools}"];

/// Launches the configured runner command.
#[derive(Debug, Clone)]
pub struct CommandProcess {
    runner: RunnerSettings,
    ctx: ProjectContext,
    poll_interval: Duration,
}

impl CommandProcess {
    pub fn new(runner: RunnerSettings, ctx: ProjectContext) -> Self {
        Self {
            runner,
            ctx,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// The program and arguments for `invocation`.
    pub fn command_line(&self, invocation: &Invocation) -> Result<Vec<String>> {
        let templates = shell_words::split(&self.runner.args).map_err(|e| {
            RosterError::ConfigError(format!(
                "failed to parse runner args '{}': {}\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                self.runner.args, e
            ))
        })?;
        let vars = runner_vars(invocation);

        let mut args = vec![self.runner.program.clone()];
        for arg_template in &templates {
            let rendered = template::render(arg_template, &vars).map_err(|e| {
                RosterError::ConfigError(format!(
                    "runner argument '{}' is invalid: {}",
                    arg_template, e
                ))
            })?;
            if rendered.is_empty() && OPTIONAL_ARGS.contains(&arg_template.as_str()) {
                if args.len() > 1 && args.last().is_some_and(|a| a.starts_with('-')) {
                    args.pop();
                }
                continue;
            }
            args.push(rendered);
        }
        Ok(args)
    }
}

fn runner_vars(invocation: &Invocation) -> HashMap<String, String> {
    template::params([
        ("instruction", invocation.instruction.clone()),
        ("system_prompt", invocation.system_prompt.clone()),
        ("allowed_tools", invocation.restrictions.allowed_tools_arg()),
        (
            "disallowed_tools",
            invocation.restrictions.disallowed_tools_arg(),
        ),
        (
            "permission_mode",
            invocation.permission_mode.as_runner_arg().to_string(),
        ),
        ("model", invocation.model.clone().unwrap_or_default()),
    ])
}

impl LlmProcess for CommandProcess {
    fn invoke(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ProcessOutput> {
        let args = self.command_line(invocation)?;
        let program = &args[0];

        let capture = Capture::create(self.ctx.run_dir(&invocation.agent, &invocation.run_id))?;
        let stdout_path = capture.dir.join("stdout.log");
        let stderr_path = capture.dir.join("stderr.log");
        let stdout_file = create_log(&stdout_path)?;
        let stderr_file = create_log(&stderr_path)?;

        let mut command = Command::new(program);
        command
            .args(&args[1..])
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file));
        for (key, value) in &self.runner.environment {
            command.env(key, value);
        }

        tracing::debug!(
            agent = %invocation.agent,
            run_id = %invocation.run_id,
            program = %program,
            "spawning runner"
        );

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            RosterError::UserError(format!(
                "failed to execute runner '{}': {}\n\
                 Fix: ensure the command is installed and in PATH.",
                program, e
            ))
        })?;

        let (exit_code, ended) =
            wait_with_timeout(&mut child, invocation.timeout, cancel, self.poll_interval)?;
        let duration = start.elapsed();

        Ok(ProcessOutput {
            exit_code,
            stdout: read_log(&stdout_path),
            stderr: read_log(&stderr_path),
            duration,
            ended,
        })
    }
}

/// Scratch directory for one run's output, deleted on drop.
struct Capture {
    dir: PathBuf,
}

impl Capture {
    fn create(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| {
            RosterError::io(
                format!("failed to create run directory '{}'", dir.display()),
                e,
            )
        })?;
        Ok(Self { dir })
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::debug!(dir = %self.dir.display(), error = %e, "failed to remove run directory");
        }
    }
}

fn create_log(path: &Path) -> Result<File> {
    File::create(path)
        .map_err(|e| RosterError::io(format!("failed to create log '{}'", path.display()), e))
}

fn read_log(path: &Path) -> String {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Poll the child until it exits, the timeout passes, or `cancel` is set.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancelToken,
    poll_interval: Duration,
) -> Result<(Option<i32>, Ended)> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok((status.code(), Ended::Exited)),
            Ok(None) => {
                if cancel.is_cancelled() {
                    kill_process(child);
                    return Ok((None, Ended::Cancelled));
                }
                if start.elapsed() >= timeout {
                    kill_process(child);
                    return Ok((None, Ended::TimedOut));
                }
                std::thread::sleep(poll_interval);
            }
            Err(e) => {
                kill_process(child);
                return Err(RosterError::io("failed to check process status", e));
            }
        }
    }
}

/// Kill a process and reap it.
fn kill_process(child: &mut Child) {
    // On Unix this is SIGKILL; on Windows it is TerminateProcess.
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CommandPolicy;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn restrictions() -> Restrictions {
        let tools: BTreeSet<String> = ["Read", "Bash"].iter().map(|s| s.to_string()).collect();
        let policy = CommandPolicy::new(vec!["git *".into()], vec!["rm -rf /".into()]).unwrap();
        Restrictions::resolve(&tools, &policy, None).unwrap()
    }

    fn invocation(temp: &TempDir, instruction: &str, timeout: Duration) -> Invocation {
        Invocation {
            agent: "Tango".into(),
            run_id: "run-1".into(),
            instruction: instruction.into(),
            system_prompt: "You are Tango.".into(),
            restrictions: restrictions(),
            working_dir: temp.path().to_path_buf(),
            timeout,
            model: None,
            permission_mode: PermissionMode::AcceptEdits,
        }
    }

    fn runner(program: &str, args: &str) -> CommandProcess {
        let temp_root = std::env::temp_dir();
        CommandProcess::new(
            RunnerSettings {
                program: program.into(),
                args: args.into(),
                environment: HashMap::new(),
            },
            ProjectContext::at(temp_root).unwrap(),
        )
    }

    fn process_in(temp: &TempDir, program: &str, args: &str) -> CommandProcess {
        CommandProcess::new(
            RunnerSettings {
                program: program.into(),
                args: args.into(),
                environment: HashMap::new(),
            },
            ProjectContext::at(temp.path()).unwrap(),
        )
    }

    #[test]
    fn default_command_line_keeps_instruction_as_one_argument() {
        let temp = TempDir::new().unwrap();
        let process = CommandProcess::new(
            RunnerSettings::default(),
            ProjectContext::at(temp.path()).unwrap(),
        );
        let inv = invocation(&temp, "write tests for {the} parser", Duration::from_secs(5));

        let args = process.command_line(&inv).unwrap();

        assert_eq!(args[0], "claude");
        assert_eq!(args.last().unwrap(), "write tests for {the} parser");
        let tools_at = args.iter().position(|a| a == "--allowedTools").unwrap();
        assert_eq!(args[tools_at + 1], "Bash(git *),Read");
        let mode_at = args.iter().position(|a| a == "--permission-mode").unwrap();
        assert_eq!(args[mode_at + 1], "acceptEdits");
        let denied_at = args.iter().position(|a| a == "--disallowedTools").unwrap();
        assert_eq!(args[denied_at + 1], "Bash(rm -rf /)");
    }

    #[test]
    fn empty_optional_arguments_are_dropped_with_their_flag() {
        let temp = TempDir::new().unwrap();
        let process = runner("claude", "--print --model {model} {instruction}");
        let inv = invocation(&temp, "hi", Duration::from_secs(5));
        assert_eq!(
            process.command_line(&inv).unwrap(),
            vec!["claude", "--print", "hi"]
        );

        let inv = Invocation {
            model: Some("opus".into()),
            ..inv
        };
        assert_eq!(
            process.command_line(&inv).unwrap(),
            vec!["claude", "--print", "--model", "opus", "hi"]
        );
    }

    #[test]
    fn unknown_runner_placeholder_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        let process = runner("claude", "{prompt}");
        let err = process
            .command_line(&invocation(&temp, "hi", Duration::from_secs(5)))
            .unwrap_err();
        assert!(matches!(err, RosterError::ConfigError(_)));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_removes_the_run_directory() {
        let temp = TempDir::new().unwrap();
        let process = process_in(&temp, "echo", "{instruction}");
        let inv = invocation(&temp, "hello from tango", Duration::from_secs(10));

        let output = process.invoke(&inv, &CancelToken::new()).unwrap();

        assert!(output.is_success());
        assert_eq!(output.stdout.trim(), "hello from tango");
        let run_dir = ProjectContext::at(temp.path())
            .unwrap()
            .run_dir("Tango", "run-1");
        assert!(!run_dir.exists());
    }

    #[test]
    fn spawn_failure_removes_the_run_directory() {
        let temp = TempDir::new().unwrap();
        let process = process_in(&temp, "nonexistent_runner_xyz_123", "{instruction}");
        process
            .invoke(
                &invocation(&temp, "hi", Duration::from_secs(5)),
                &CancelToken::new(),
            )
            .unwrap_err();

        let run_dir = ProjectContext::at(temp.path())
            .unwrap()
            .run_dir("Tango", "run-1");
        assert!(!run_dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_reported() {
        let temp = TempDir::new().unwrap();
        let process = process_in(&temp, "sh", "-c \"echo broken >&2; exit 1\"");
        let output = process
            .invoke(
                &invocation(&temp, "", Duration::from_secs(10)),
                &CancelToken::new(),
            )
            .unwrap();

        assert!(!output.is_success());
        assert_eq!(output.exit_code, Some(1));
        assert_eq!(output.ended, Ended::Exited);
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_process() {
        let temp = TempDir::new().unwrap();
        let process = process_in(&temp, "sleep", "10");
        let start = Instant::now();
        let output = process
            .invoke(
                &invocation(&temp, "", Duration::from_secs(1)),
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(output.ended, Ended::TimedOut);
        assert_eq!(output.exit_code, None);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn cancel_kills_the_process() {
        let temp = TempDir::new().unwrap();
        let process = process_in(&temp, "sleep", "10");
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let output = process
            .invoke(&invocation(&temp, "", Duration::from_secs(30)), &cancel)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(output.ended, Ended::Cancelled);
    }

    #[cfg(unix)]
    #[test]
    fn runner_environment_is_passed() {
        let temp = TempDir::new().unwrap();
        let mut process = process_in(&temp, "sh", "-c \"echo $ROSTER_TEST_VAR\"");
        process
            .runner
            .environment
            .insert("ROSTER_TEST_VAR".into(), "test_value".into());

        let output = process
            .invoke(
                &invocation(&temp, "", Duration::from_secs(10)),
                &CancelToken::new(),
            )
            .unwrap();
        assert!(output.stdout.contains("test_value"));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let temp = TempDir::new().unwrap();
        let process = process_in(&temp, "nonexistent_runner_xyz_123", "{instruction}");
        let err = process
            .invoke(
                &invocation(&temp, "hi", Duration::from_secs(5)),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("failed to execute runner"));
    }
}
