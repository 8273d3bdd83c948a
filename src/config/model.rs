//! Agent configuration records.
//!
//! `AgentSpec` is the raw, serde-facing shape of one agent in `agents.yaml`
//! (or a built-in role). `AgentConfig` is the validated, immutable value a
//! facade owns; it is only produced by `AgentConfig::new`.

use super::types::*;
use crate::dispatch::AMBIENT_VARS;
use crate::error::{Result, RosterError};
use crate::policy::CommandPolicy;
use crate::remote::ISSUE_VARS;
use crate::template;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Name of the general-purpose operation every agent exposes.
pub const WORK_OPERATION: &str = "work";

/// One agent as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,

    pub role: String,

    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,

    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_blocked_commands")]
    pub blocked_commands: Vec<String>,

    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    pub permission_mode: PermissionMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Overrides `defaults.timeout_seconds`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Overrides `defaults.notifications`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationSettings>,

    #[serde(default)]
    pub operations: BTreeMap<String, OperationSpec>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl AgentSpec {
    pub fn new(name: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            allowed_tools: default_allowed_tools(),
            allowed_commands: default_allowed_commands(),
            blocked_commands: default_blocked_commands(),
            system_prompt: String::new(),
            permission_mode: PermissionMode::default(),
            model: None,
            timeout_seconds: None,
            notifications: None,
            operations: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Validated, immutable configuration of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    key: String,
    name: String,
    role: String,
    allowed_tools: BTreeSet<String>,
    commands: CommandPolicy,
    notifications: NotificationSettings,
    project_root: PathBuf,
    remote_repo: Option<String>,
    system_prompt: String,
    permission_mode: PermissionMode,
    model: Option<String>,
    timeout_seconds: u64,
    operations: BTreeMap<String, OperationSpec>,
}

impl AgentConfig {
    /// Validate a spec and freeze it into a config.
    ///
    /// Validation rules:
    /// - key, name and role must be non-empty
    /// - the effective timeout must be positive
    /// - command patterns must compile as globs
    /// - operation names must be non-empty and templates well-formed
    /// - commit templates may only use the operation's placeholders, the
    ///   ambient variables and, for issue-bound operations, the issue ones
    /// - an operation's `tools` must be a subset of the agent's tools
    ///
    /// The project root is stored as given; whether it exists is the caller's
    /// concern.
    pub fn new(
        key: &str,
        spec: AgentSpec,
        defaults: &Defaults,
        project_root: &Path,
        remote_repo: Option<String>,
    ) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(RosterError::ConfigError(
                "agent identifier cannot be empty".to_string(),
            ));
        }
        if spec.name.trim().is_empty() {
            return Err(RosterError::ConfigError(format!(
                "agent '{}' has an empty name",
                key
            )));
        }
        if spec.role.trim().is_empty() {
            return Err(RosterError::ConfigError(format!(
                "agent '{}' has an empty role",
                key
            )));
        }

        let timeout_seconds = spec.timeout_seconds.unwrap_or(defaults.timeout_seconds);
        if timeout_seconds == 0 {
            return Err(RosterError::ConfigError(format!(
                "agent '{}': timeout_seconds must be greater than 0",
                key
            )));
        }

        let commands = CommandPolicy::new(spec.allowed_commands, spec.blocked_commands)
            .map_err(|e| RosterError::ConfigError(format!("agent '{}': {}", key, e)))?;
        let allowed_tools: BTreeSet<String> = spec.allowed_tools.into_iter().collect();

        let mut operations = spec.operations;
        operations
            .entry(WORK_OPERATION.to_string())
            .or_insert_with(|| OperationSpec::new("Run a free-form task", "{task}"));

        for (op_name, op) in &operations {
            validate_operation(key, op_name, op, &allowed_tools)?;
        }

        Ok(Self {
            key: key.to_string(),
            name: spec.name,
            role: spec.role,
            allowed_tools,
            commands,
            notifications: spec
                .notifications
                .unwrap_or_else(|| defaults.notifications.clone()),
            project_root: project_root.to_path_buf(),
            remote_repo: remote_repo.filter(|r| !r.trim().is_empty()),
            system_prompt: spec.system_prompt,
            permission_mode: spec.permission_mode,
            model: spec.model,
            timeout_seconds,
            operations,
        })
    }

    /// CLI identifier (the key in `agents.yaml`).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn allowed_tools(&self) -> &BTreeSet<String> {
        &self.allowed_tools
    }

    pub fn commands(&self) -> &CommandPolicy {
        &self.commands
    }

    pub fn notifications(&self) -> &NotificationSettings {
        &self.notifications
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn remote_repo(&self) -> Option<&str> {
        self.remote_repo.as_deref()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn permission_mode(&self) -> PermissionMode {
        self.permission_mode
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn operations(&self) -> &BTreeMap<String, OperationSpec> {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.get(name)
    }
}

fn validate_operation(
    key: &str,
    op_name: &str,
    op: &OperationSpec,
    allowed_tools: &BTreeSet<String>,
) -> Result<()> {
    if op_name.trim().is_empty() {
        return Err(RosterError::ConfigError(format!(
            "agent '{}' has an operation with an empty name",
            key
        )));
    }
    let bad = |detail: String| {
        RosterError::ConfigError(format!("agent '{}' operation '{}': {}", key, op_name, detail))
    };

    let params = template::placeholders(&op.template).map_err(|e| bad(e.to_string()))?;
    match &op.issue {
        Some(param) if !params.contains(param) => {
            return Err(bad(format!(
                "issue parameter '{}' is not a placeholder of the template",
                param
            )));
        }
        None => {
            if let Some(var) = params.iter().find(|p| ISSUE_VARS.contains(&p.as_str())) {
                return Err(bad(format!(
                    "template uses '{{{}}}' but the operation has no issue parameter",
                    var
                )));
            }
        }
        Some(_) => {}
    }

    if let Some(commit) = &op.commit {
        let used = template::placeholders(commit)
            .map_err(|e| bad(format!("commit message: {}", e)))?;
        let known = |name: &str| {
            params.contains(name)
                || AMBIENT_VARS.contains(&name)
                || (op.issue.is_some() && ISSUE_VARS.contains(&name))
        };
        if let Some(unknown) = used.iter().find(|name| !known(name.as_str())) {
            return Err(bad(format!(
                "commit message uses '{{{}}}', which is neither an operation parameter \
                 nor an ambient variable",
                unknown
            )));
        }
    }
    if let Some(tools) = &op.tools
        && let Some(outside) = tools.iter().find(|t| !allowed_tools.contains(t.as_str()))
    {
        return Err(bad(format!(
            "requests tool '{}' outside the agent's allowed tools",
            outside
        )));
    }
    Ok(())
}

/// Contents of `.roster/agents.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterFile {
    pub defaults: Defaults,

    pub runner: RunnerSettings,

    /// Identifier of the remote repository (e.g. `owner/name`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_repo: Option<String>,

    /// Agents keyed by identifier. Entries replace built-in roles of the same key.
    pub agents: BTreeMap<String, AgentSpec>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}
