//! The outcome of one dispatch.

use crate::exit_codes;
use crate::template::TemplateError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Why a dispatch did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("approval denied: {reason}")]
    ApprovalDenied { reason: String },

    #[error("timed out after {seconds}s; the process was killed")]
    Timeout { seconds: u64 },

    #[error("interrupted while the process was running")]
    Interrupted,

    #[error("cancelled before the process was started")]
    Cancelled,

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("process exited with {}{}", exit_status(.exit_code), stderr_tail(.stderr))]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to start process: {0}")]
    SpawnFailed(String),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let last = trimmed.lines().last().unwrap_or(trimmed);
    format!(": {}", last)
}

impl TaskError {
    /// Stable taxonomy name.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Template(_) => "TemplateError",
            TaskError::ApprovalDenied { .. } => "ApprovalDenied",
            TaskError::Timeout { .. } => "TimeoutError",
            TaskError::Interrupted => "Interrupted",
            TaskError::Cancelled => "Cancelled",
            TaskError::PolicyViolation(_) => "PolicyViolation",
            TaskError::ProcessFailed { .. } => "ProcessFailed",
            TaskError::SpawnFailed(_) => "SpawnFailed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::Template(_) | TaskError::PolicyViolation(_) => exit_codes::USER_ERROR,
            TaskError::ProcessFailed { .. } | TaskError::SpawnFailed(_) => {
                exit_codes::PROCESS_FAILURE
            }
            TaskError::Timeout { .. } => exit_codes::TIMEOUT,
            TaskError::ApprovalDenied { .. } => exit_codes::APPROVAL_DENIED,
            TaskError::Interrupted | TaskError::Cancelled => exit_codes::INTERRUPTED,
        }
    }
}

/// Caveat attached to results whose process was killed mid-run.
pub const INTERRUPTED_CAVEAT: &str =
    "the process was killed mid-run; changes it already made are not rolled back";

/// Everything a caller learns about one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub operation: String,
    pub success: bool,
    /// Captured standard output of the process, empty if it never ran.
    pub output: String,
    pub error: Option<TaskError>,
    /// Exit code of the process, if it exited on its own.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub caveat: Option<String>,
}

impl TaskResult {
    pub fn succeeded(
        operation: &str,
        output: String,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            success: true,
            output,
            error: None,
            exit_code,
            duration,
            caveat: None,
        }
    }

    pub fn failed(operation: &str, error: TaskError, duration: Duration) -> Self {
        let caveat = matches!(error, TaskError::Interrupted).then(|| INTERRUPTED_CAVEAT.to_string());
        Self {
            operation: operation.to_string(),
            success: false,
            output: String::new(),
            error: Some(error),
            exit_code: None,
            duration,
            caveat,
        }
    }

    pub fn with_output(mut self, output: String, exit_code: Option<i32>) -> Self {
        self.output = output;
        self.exit_code = exit_code;
        self
    }

    /// Exit code for the CLI: 0 on success, otherwise the error's code.
    pub fn status_code(&self) -> i32 {
        match &self.error {
            None if self.success => exit_codes::SUCCESS,
            Some(error) => error.exit_code(),
            None => exit_codes::PROCESS_FAILURE,
        }
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        self.error.as_ref().map(TaskError::kind)
    }
}

/// One entry of a dispatcher's in-memory history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub run_id: String,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
    pub error_kind: Option<&'static str>,
}
