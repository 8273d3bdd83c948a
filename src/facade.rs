//! Per-role facade: one agent, its named operations, and its status.
//!
//! Issue-bound operations also talk to the remote repository: the issue is
//! fetched into the parameters before the run, labelled and commented on.

use crate::approval::{ApprovalGate, SystemClock, mailbox};
use crate::config::{AgentConfig, OperationSpec, Roster, WORK_OPERATION};
use crate::context::ProjectContext;
use crate::dispatch::{
    CancelToken, CommandProcess, DispatchPlan, DispatchRequest, Dispatcher, LlmProcess,
    TaskResult,
};
use crate::error::{Result, RosterError};
use crate::notify::{NotificationEvent, Notifier, read_last_event};
use crate::remote::{GitHub, IN_PROGRESS_LABEL, Issue, Remote, issue_number};
use crate::template;
use crate::vcs::{Git, Vcs};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Snapshot of an agent for `--status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub key: String,
    pub name: String,
    pub role: String,
    pub pending_approvals: usize,
    pub tasks_completed: usize,
    pub tasks_succeeded: usize,
    pub project_root: PathBuf,
    pub remote_repo: Option<String>,
    pub last_notification: Option<NotificationEvent>,
}

/// The remote issue an operation is working on.
#[derive(Debug, Clone)]
struct BoundIssue {
    repo: String,
    issue: Issue,
}

/// A named agent bound to the generic dispatcher.
pub struct Agent {
    dispatcher: Dispatcher,
    vcs: Option<Arc<dyn Vcs>>,
    remote: Option<Arc<dyn Remote>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("dispatcher", &self.dispatcher)
            .field("vcs", &self.vcs.is_some())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl Agent {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            vcs: None,
            remote: None,
        }
    }

    /// Build an agent from the project roster with the real runner, a
    /// mailbox-backed approval gate, git for commits and `gh` for issues.
    pub fn from_roster(ctx: &ProjectContext, roster: &Roster, key: &str) -> Result<Self> {
        let config = roster.require(key)?.clone();
        let notifier = Arc::new(Notifier::new(
            config.name(),
            config.notifications(),
            &ctx.notification_log_path(),
        ));
        let gate = ApprovalGate::new(
            config.name(),
            roster.approval_timeout(),
            Arc::new(SystemClock),
            Arc::clone(&notifier),
        )
        .with_mailbox(ctx.approvals_dir());
        let process: Arc<dyn LlmProcess> =
            Arc::new(CommandProcess::new(roster.runner().clone(), ctx.clone()));

        let dispatcher = Dispatcher::new(config, process, Arc::new(gate), notifier);
        Ok(Self::new(dispatcher)
            .with_vcs(Arc::new(Git))
            .with_remote(Arc::new(GitHub::default())))
    }

    pub fn with_vcs(mut self, vcs: Arc<dyn Vcs>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn Remote>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        self.dispatcher.config()
    }

    pub fn gate(&self) -> &Arc<ApprovalGate> {
        self.dispatcher.gate()
    }

    /// Run a named operation with its parameters.
    ///
    /// An unknown operation is a caller error, as is an issue-bound operation
    /// whose issue cannot be fetched. Everything after that is reported
    /// through the `TaskResult`.
    pub fn perform(
        &mut self,
        operation: &str,
        mut params: HashMap<String, String>,
        cancel: &CancelToken,
    ) -> Result<TaskResult> {
        let op = self.operation(operation)?.clone();
        let mut notes = Vec::new();

        // A cancelled run must not touch the remote either.
        let bound = match &op.issue {
            Some(param) if !cancel.is_cancelled() => {
                Some(self.open_issue(operation, param, &mut params, &mut notes)?)
            }
            _ => None,
        };

        let request = request_for(operation, &op, params.clone());
        let mut result = self.dispatcher.run(&request, cancel);

        let mut sha = None;
        if result.success
            && let Some(message_template) = &op.commit
        {
            let issue = bound.as_ref().map(|b| b.issue.number);
            let (note, committed) = self.commit(message_template, &params, issue);
            notes.push(note);
            sha = committed;
        }
        if let Some(bound) = &bound
            && let Some(note) = self.report_issue(bound, &result, sha.as_deref())
        {
            notes.push(note);
        }

        for note in notes {
            if !result.output.is_empty() && !result.output.ends_with('\n') {
                result.output.push('\n');
            }
            result.output.push_str(&note);
        }
        Ok(result)
    }

    /// Run a free-form task through the `work` operation.
    pub fn work(&mut self, task: &str, cancel: &CancelToken) -> Result<TaskResult> {
        if self.config().operation(WORK_OPERATION).is_none() {
            return Err(RosterError::ConfigError(format!(
                "agent '{}' has no '{}' operation",
                self.config().key(),
                WORK_OPERATION
            )));
        }
        self.perform(WORK_OPERATION, template::params([("task", task)]), cancel)
    }

    /// What `perform` would do, without running, notifying or calling the
    /// remote. Issue variables render as placeholders.
    pub fn plan(
        &self,
        operation: &str,
        mut params: HashMap<String, String>,
    ) -> Result<DispatchPlan> {
        let op = self.operation(operation)?;
        if op.issue.is_some() {
            for (name, shown) in [
                ("issue_title", "<issue title>"),
                ("issue_body", "<issue body>"),
                ("issue_url", "<issue url>"),
            ] {
                params.insert(name.to_string(), shown.to_string());
            }
        }
        self.dispatcher
            .plan(&request_for(operation, op, params))
            .map_err(|e| RosterError::UserError(e.to_string()))
    }

    pub fn status(&self) -> AgentStatus {
        let config = self.config();
        let gate = self.gate();

        let pending_approvals = match gate.mailbox() {
            Some(dir) => mailbox::pending(dir, gate.now())
                .map(|requests| {
                    requests
                        .iter()
                        .filter(|r| r.agent == config.name())
                        .count()
                })
                .unwrap_or_else(|_| gate.pending_count()),
            None => gate.pending_count(),
        };

        let notifier = self.dispatcher.notifier();
        let last_notification = notifier
            .last_event()
            .or_else(|| read_last_event(notifier.log_path(), Some(config.name())));

        AgentStatus {
            key: config.key().to_string(),
            name: config.name().to_string(),
            role: config.role().to_string(),
            pending_approvals,
            tasks_completed: self.dispatcher.tasks_completed(),
            tasks_succeeded: self.dispatcher.tasks_succeeded(),
            project_root: config.project_root().to_path_buf(),
            remote_repo: config.remote_repo().map(str::to_string),
            last_notification,
        }
    }

    fn operation(&self, operation: &str) -> Result<&OperationSpec> {
        let config = self.config();
        config.operation(operation).ok_or_else(|| {
            RosterError::UserError(format!(
                "{} has no operation '{}'.\nAvailable operations: {}",
                config.name(),
                operation,
                config
                    .operations()
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Fetch the issue named by `param`, add its fields to `params` and mark
    /// it in progress.
    fn open_issue(
        &self,
        operation: &str,
        param: &str,
        params: &mut HashMap<String, String>,
        notes: &mut Vec<String>,
    ) -> Result<BoundIssue> {
        let config = self.config();
        let Some(repo) = config.remote_repo() else {
            return Err(RosterError::UserError(format!(
                "'{}' works on a remote issue but no remote repository is configured.\n\
                 Fix: set remote_repo in .roster/agents.yaml or ROSTER_REMOTE_REPO.",
                operation
            )));
        };
        let Some(remote) = &self.remote else {
            return Err(RosterError::UserError(format!(
                "'{}' works on a remote issue but {} has no remote client",
                operation,
                config.name()
            )));
        };
        let raw = params.get(param).map(String::as_str).unwrap_or_default();
        let number = issue_number(raw).ok_or_else(|| {
            RosterError::UserError(format!("'{}' is not an issue number", raw))
        })?;

        let issue = remote.issue(repo, number).map_err(|e| {
            RosterError::UserError(format!("failed to fetch issue #{}: {:#}", number, e))
        })?;
        tracing::info!(issue = number, state = %issue.state, "fetched issue");

        params.insert(param.to_string(), number.to_string());
        params.insert("issue_title".to_string(), issue.title.clone());
        params.insert("issue_body".to_string(), issue.body.clone());
        params.insert("issue_url".to_string(), issue.url.clone());

        if !issue.labels.iter().any(|l| l == IN_PROGRESS_LABEL)
            && let Err(e) = remote.add_label(repo, number, IN_PROGRESS_LABEL)
        {
            tracing::warn!(issue = number, error = %e, "failed to label issue");
            notes.push(format!("[remote] failed to label #{}: {:#}", number, e));
        }
        let started = format!(
            "{} ({}) started working on this issue.",
            config.name(),
            config.role()
        );
        if let Err(e) = remote.comment(repo, number, &started) {
            tracing::warn!(issue = number, error = %e, "failed to comment on issue");
            notes.push(format!("[remote] failed to comment on #{}: {:#}", number, e));
        }

        Ok(BoundIssue {
            repo: repo.to_string(),
            issue,
        })
    }

    /// Tell the issue how the run ended.
    fn report_issue(
        &self,
        bound: &BoundIssue,
        result: &TaskResult,
        sha: Option<&str>,
    ) -> Option<String> {
        let remote = self.remote.as_ref()?;
        let name = self.config().name();
        let body = match (&result.error, sha) {
            (None, Some(sha)) => format!("{} applied a fix in commit {}.", name, sha),
            (None, None) => format!("{} finished '{}'.", name, result.operation),
            (Some(error), _) => format!(
                "{} could not finish '{}' [{}]: {}",
                name,
                result.operation,
                error.kind(),
                error
            ),
        };
        let number = bound.issue.number;
        match remote.comment(&bound.repo, number, &body) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(issue = number, error = %e, "failed to comment on issue");
                Some(format!("[remote] failed to comment on #{}: {:#}", number, e))
            }
        }
    }

    /// Commit after a successful operation. Returns the note and the new
    /// commit id, if any.
    fn commit(
        &self,
        message_template: &str,
        params: &HashMap<String, String>,
        issue: Option<u64>,
    ) -> (String, Option<String>) {
        let Some(vcs) = &self.vcs else {
            return ("[commit] skipped: no version control configured".to_string(), None);
        };
        let config = self.config();

        let vars = self.dispatcher.template_vars(params);
        let mut message = match template::render(message_template, &vars) {
            Ok(message) => message,
            Err(e) => return (format!("[commit] skipped: {}", e), None),
        };
        if let Some(number) = issue
            && !mentions_issue(&message, number)
        {
            message.push_str(&format!(" (#{})", number));
        }

        if !config.commands().permits("git commit") {
            return (
                "[commit] skipped: git is not in the allowed commands".to_string(),
                None,
            );
        }

        match vcs.commit_all(config.project_root(), &message) {
            Ok(Some(sha)) => {
                tracing::info!(sha = %sha, "committed");
                (format!("[commit] {} {}", sha, message), Some(sha))
            }
            Ok(None) => ("[commit] nothing to commit".to_string(), None),
            Err(e) => {
                let e = RosterError::from(e);
                tracing::warn!(error = %e, "commit failed");
                (format!("[commit] failed: {}", e), None)
            }
        }
    }
}

fn request_for(
    operation: &str,
    op: &OperationSpec,
    params: HashMap<String, String>,
) -> DispatchRequest {
    DispatchRequest::new(operation, &op.template)
        .with_params(params)
        .dangerous(op.dangerous)
        .with_tools(op.tools.clone())
}

/// Whether `message` already refers to `#number` (and not `#number0`).
fn mentions_issue(message: &str, number: u64) -> bool {
    let tag = format!("#{}", number);
    message
        .match_indices(&tag)
        .any(|(at, _)| !message[at + tag.len()..].starts_with(|c: char| c.is_ascii_digit()))
}
