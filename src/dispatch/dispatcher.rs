//! Generic task dispatch shared by every agent.

use super::cancel::CancelToken;
use super::process::{Ended, Invocation, LlmProcess, ProcessOutput};
use super::result::{TaskError, TaskRecord, TaskResult};
use crate::approval::ApprovalGate;
use crate::config::AgentConfig;
use crate::error::RosterError;
use crate::notify::Notifier;
use crate::policy::Restrictions;
use crate::template;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One unit of work for the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Operation name, used in notifications and history.
    pub operation: String,
    /// Prompt template with `{placeholders}`.
    pub template: String,
    pub params: HashMap<String, String>,
    pub dangerous: bool,
    /// Narrowed tool set; `None` means the agent's full set.
    pub tools: Option<Vec<String>>,
}

impl DispatchRequest {
    pub fn new(operation: &str, template: &str) -> Self {
        Self {
            operation: operation.to_string(),
            template: template.to_string(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn dangerous(mut self, dangerous: bool) -> Self {
        self.dangerous = dangerous;
        self
    }

    pub fn with_tools(mut self, tools: Option<Vec<String>>) -> Self {
        self.tools = tools;
        self
    }
}

/// What a dispatch would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub operation: String,
    pub instruction: String,
    pub restrictions: Restrictions,
    pub needs_approval: bool,
    pub timeout: Duration,
}

/// Runs requests for one agent: render, restrict, gate, invoke, notify.
pub struct Dispatcher {
    config: AgentConfig,
    process: Arc<dyn LlmProcess>,
    gate: Arc<ApprovalGate>,
    notifier: Arc<Notifier>,
    history: Vec<TaskRecord>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("agent", &self.config.name())
            .field("gate", &self.gate)
            .field("history", &self.history.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        config: AgentConfig,
        process: Arc<dyn LlmProcess>,
        gate: Arc<ApprovalGate>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            config,
            process,
            gate,
            notifier,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<ApprovalGate> {
        &self.gate
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn history(&self) -> &[TaskRecord] {
        &self.history
    }

    pub fn tasks_completed(&self) -> usize {
        self.history.len()
    }

    pub fn tasks_succeeded(&self) -> usize {
        self.history.iter().filter(|r| r.success).count()
    }

    /// Render and resolve `request` without gating or invoking anything.
    pub fn plan(&self, request: &DispatchRequest) -> Result<DispatchPlan, TaskError> {
        Ok(DispatchPlan {
            operation: request.operation.clone(),
            instruction: self.render(request)?,
            restrictions: self.restrictions(request)?,
            needs_approval: request.dangerous,
            timeout: Duration::from_secs(self.config.timeout_seconds()),
        })
    }

    /// Run one request to completion.
    ///
    /// Always returns a result and always emits exactly one `success` or
    /// `error` notification that agrees with it.
    pub fn run(&mut self, request: &DispatchRequest, cancel: &CancelToken) -> TaskResult {
        let run_id = new_run_id();
        let started_at = Utc::now();
        let start = Instant::now();

        let _span = tracing::info_span!(
            "dispatch",
            agent = %self.config.name(),
            operation = %request.operation,
            run_id = %run_id
        )
        .entered();

        let mut result = self.execute(request, cancel, &run_id);
        result.duration = start.elapsed();

        self.announce(&result);
        self.history.push(TaskRecord {
            run_id,
            operation: request.operation.clone(),
            started_at,
            duration: result.duration,
            success: result.success,
            error_kind: result.error_kind(),
        });
        result
    }

    fn execute(&self, request: &DispatchRequest, cancel: &CancelToken, run_id: &str) -> TaskResult {
        let op = request.operation.as_str();
        let fail = |error: TaskError| TaskResult::failed(op, error, Duration::ZERO);

        if cancel.is_cancelled() {
            return fail(TaskError::Cancelled);
        }

        let instruction = match self.render(request) {
            Ok(instruction) => instruction,
            Err(e) => return fail(e),
        };
        let restrictions = match self.restrictions(request) {
            Ok(restrictions) => restrictions,
            Err(e) => return fail(e),
        };

        if request.dangerous {
            let description = approval_description(op, &instruction);
            let outcome = self.gate.request(&description, true, cancel);
            if outcome.cancelled {
                tracing::info!("cancelled while waiting for approval");
                return fail(TaskError::Cancelled);
            }
            if !outcome.is_approved() {
                let reason = outcome
                    .reason
                    .unwrap_or_else(|| "denied without a reason".to_string());
                tracing::info!(reason = %reason, "approval denied");
                return fail(TaskError::ApprovalDenied { reason });
            }
        }

        if cancel.is_cancelled() {
            return fail(TaskError::Cancelled);
        }

        let invocation = Invocation {
            agent: self.config.name().to_string(),
            run_id: run_id.to_string(),
            instruction,
            system_prompt: self.config.system_prompt().to_string(),
            restrictions,
            working_dir: self.config.project_root().to_path_buf(),
            timeout: Duration::from_secs(self.config.timeout_seconds()),
            model: self.config.model().map(str::to_string),
            permission_mode: self.config.permission_mode(),
        };

        match self.process.invoke(&invocation, cancel) {
            Ok(output) => interpret(op, output, invocation.timeout),
            Err(e) => fail(TaskError::SpawnFailed(e.to_string())),
        }
    }

    /// The ambient variables overlaid with `params`.
    pub fn template_vars(&self, params: &HashMap<String, String>) -> HashMap<String, String> {
        let mut vars = template::params([
            ("agent", self.config.name()),
            ("role", self.config.role()),
            ("repo", self.config.remote_repo().unwrap_or("")),
        ]);
        vars.insert(
            "project_root".to_string(),
            self.config.project_root().display().to_string(),
        );
        for (key, value) in params {
            vars.insert(key.clone(), value.clone());
        }
        vars
    }

    fn render(&self, request: &DispatchRequest) -> Result<String, TaskError> {
        let vars = self.template_vars(&request.params);
        Ok(template::render(&request.template, &vars)?)
    }

    fn restrictions(&self, request: &DispatchRequest) -> Result<Restrictions, TaskError> {
        Restrictions::resolve(
            self.config.allowed_tools(),
            self.config.commands(),
            request.tools.as_deref(),
        )
        .map_err(|e| match e {
            RosterError::PolicyViolation(msg) => TaskError::PolicyViolation(msg),
            other => TaskError::PolicyViolation(other.to_string()),
        })
    }

    fn announce(&self, result: &TaskResult) {
        let secs = result.duration.as_secs_f64();
        match &result.error {
            None => {
                tracing::info!(duration_secs = secs, "dispatch succeeded");
                self.notifier
                    .success(format!("{} completed in {:.1}s", result.operation, secs));
            }
            Some(error) => {
                tracing::warn!(kind = error.kind(), error = %error, "dispatch failed");
                self.notifier
                    .error(format!("{} failed [{}]: {}", result.operation, error.kind(), error));
            }
        }
    }
}

fn interpret(op: &str, output: ProcessOutput, timeout: Duration) -> TaskResult {
    let duration = output.duration;
    match output.ended {
        Ended::TimedOut => TaskResult::failed(
            op,
            TaskError::Timeout {
                seconds: timeout.as_secs(),
            },
            duration,
        )
        .with_output(output.stdout, None),
        Ended::Cancelled => TaskResult::failed(op, TaskError::Interrupted, duration)
            .with_output(output.stdout, None),
        Ended::Exited if output.exit_code == Some(0) => {
            TaskResult::succeeded(op, output.stdout, output.exit_code, duration)
        }
        Ended::Exited => TaskResult::failed(
            op,
            TaskError::ProcessFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            },
            duration,
        )
        .with_output(output.stdout, output.exit_code),
    }
}

/// Short description shown to the approver.
fn approval_description(operation: &str, instruction: &str) -> String {
    const MAX: usize = 200;
    let flat = instruction.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX {
        format!("{}: {}", operation, flat)
    } else {
        let cut: String = flat.chars().take(MAX).collect();
        format!("{}: {}...", operation, cut)
    }
}

fn new_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S"), &suffix[..6])
}
