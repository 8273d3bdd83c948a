//! Supporting types for the agent configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Default timeout for one external process invocation, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Default time a dangerous operation waits for approval, in seconds.
pub const DEFAULT_APPROVAL_TIMEOUT_SECONDS: u64 = 900;

/// How much the external process may do without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionMode {
    /// Every edit needs confirmation.
    Manual,
    /// File edits are accepted, other actions need confirmation.
    #[default]
    AcceptEdits,
    /// Everything inside the allow-list is accepted.
    AcceptAll,
}

impl PermissionMode {
    /// The value passed to the runner's `{permission_mode}` placeholder.
    pub fn as_runner_arg(self) -> &'static str {
        match self {
            PermissionMode::Manual => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::AcceptAll => "bypassPermissions",
        }
    }
}

/// Which notification channels are enabled, and where they deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Append to the notification log.
    pub file: bool,
    /// Desktop notification (`osascript` / `notify-send`).
    pub desktop: bool,
    /// SMS through the messaging app.
    pub sms: bool,
    /// Phone number or address for the SMS channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_address: Option<String>,
    /// Override for the log file; defaults to `.roster/logs/notifications.log`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            file: true,
            desktop: false,
            sms: false,
            sms_address: None,
            log_path: None,
        }
    }
}

/// A named operation: a prompt fragment plus how it may run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationSpec {
    /// One-line help text.
    #[serde(default)]
    pub description: String,

    /// Prompt template with `{placeholders}` for the operation's parameters.
    pub template: String,

    /// Whether the operation needs human approval before it runs.
    #[serde(default)]
    pub dangerous: bool,

    /// Narrow the agent's tools for this operation. Must be a subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    /// Commit message template; when set, changes are committed after success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Parameter holding a remote issue number. Makes the operation
    /// issue-bound: the issue is fetched before the run and commented on after.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

impl OperationSpec {
    pub fn new(description: &str, template: &str) -> Self {
        Self {
            description: description.to_string(),
            template: template.to_string(),
            ..Default::default()
        }
    }

    pub fn dangerous(mut self) -> Self {
        self.dangerous = true;
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = Some(tools.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_commit(mut self, message: &str) -> Self {
        self.commit = Some(message.to_string());
        self
    }

    pub fn with_issue(mut self, param: &str) -> Self {
        self.issue = Some(param.to_string());
        self
    }
}

/// How the external LLM process is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Program to execute.
    pub program: String,

    /// Argument templates. Each is split with shell quoting rules first and
    /// then rendered, so an `{instruction}` containing spaces stays one
    /// argument. Placeholders: `{instruction}`, `{system_prompt}`,
    /// `{allowed_tools}`, `{disallowed_tools}`, `{permission_mode}`, `{model}`.
    pub args: String,

    /// Extra environment for the process.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: "--print --system-prompt {system_prompt} --allowedTools {allowed_tools} \
                   --disallowedTools {disallowed_tools} --permission-mode {permission_mode} \
                   {instruction}"
                .to_string(),
            environment: HashMap::new(),
        }
    }
}

/// Defaults applied to every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub timeout_seconds: u64,
    pub approval_timeout_seconds: u64,
    pub notifications: NotificationSettings,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            approval_timeout_seconds: DEFAULT_APPROVAL_TIMEOUT_SECONDS,
            notifications: NotificationSettings::default(),
            extra: BTreeMap::new(),
        }
    }
}

pub(crate) fn default_allowed_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "Glob", "Grep", "Bash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn default_allowed_commands() -> Vec<String> {
    ["git *", "gh *"].iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_blocked_commands() -> Vec<String> {
    ["rm -rf /", "rm -rf ~", "> /dev/*", "mkfs *"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
