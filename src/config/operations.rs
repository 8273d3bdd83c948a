//! Config loading, environment overrides and the agent registry.

use super::model::{AgentConfig, AgentSpec, RosterFile};
use super::types::RunnerSettings;
use crate::context::ProjectContext;
use crate::error::{Result, RosterError};
use crate::roles;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

impl RosterFile {
    /// Load `agents.yaml`. Returns `Ok(None)` if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            RosterError::io(
                format!("failed to read agents config '{}'", path.display()),
                e,
            )
        })?;
        Self::from_yaml(&content).map(Some)
    }

    /// Parse `agents.yaml` content.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: RosterFile = serde_yaml::from_str(yaml)
            .map_err(|e| RosterError::ConfigError(format!("failed to parse agents.yaml: {}", e)))?;
        file.validate()?;
        Ok(file)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            RosterError::ConfigError(format!("failed to serialize agents config: {}", e))
        })
    }

    /// File-level validation; per-agent rules live in `AgentConfig::new`.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.timeout_seconds == 0 {
            return Err(RosterError::ConfigError(
                "defaults.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.defaults.approval_timeout_seconds == 0 {
            return Err(RosterError::ConfigError(
                "defaults.approval_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.runner.program.trim().is_empty() {
            return Err(RosterError::ConfigError(
                "runner.program cannot be empty".to_string(),
            ));
        }
        shell_words::split(&self.runner.args).map_err(|e| {
            RosterError::ConfigError(format!("runner.args cannot be parsed: {}", e))
        })?;
        Ok(())
    }
}

/// Values read once from the environment when the roster is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub remote_repo: Option<String>,
    pub notify_file: Option<bool>,
    pub notify_desktop: Option<bool>,
    pub notify_sms: Option<bool>,
    pub sms_address: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl EnvOverrides {
    /// Read `ROSTER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            remote_repo: get("ROSTER_REMOTE_REPO"),
            notify_file: get("ROSTER_NOTIFY_FILE")
                .map(|v| parse_flag("ROSTER_NOTIFY_FILE", &v))
                .transpose()?,
            notify_desktop: get("ROSTER_NOTIFY_DESKTOP")
                .map(|v| parse_flag("ROSTER_NOTIFY_DESKTOP", &v))
                .transpose()?,
            notify_sms: get("ROSTER_NOTIFY_SMS")
                .map(|v| parse_flag("ROSTER_NOTIFY_SMS", &v))
                .transpose()?,
            sms_address: get("ROSTER_SMS_ADDRESS"),
            timeout_seconds: get("ROSTER_TIMEOUT_SECONDS")
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|_| {
                        RosterError::ConfigError(format!(
                            "ROSTER_TIMEOUT_SECONDS must be a whole number of seconds, got '{}'",
                            v
                        ))
                    })
                })
                .transpose()?,
        })
    }

    fn apply(&self, spec: &mut AgentSpec, file: &RosterFile) {
        let mut notifications = spec
            .notifications
            .clone()
            .unwrap_or_else(|| file.defaults.notifications.clone());
        if let Some(v) = self.notify_file {
            notifications.file = v;
        }
        if let Some(v) = self.notify_desktop {
            notifications.desktop = v;
        }
        if let Some(v) = self.notify_sms {
            notifications.sms = v;
        }
        if let Some(addr) = &self.sms_address {
            notifications.sms_address = Some(addr.clone());
        }
        spec.notifications = Some(notifications);
        if let Some(t) = self.timeout_seconds {
            spec.timeout_seconds = Some(t);
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RosterError::ConfigError(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}

/// All agents available in a project, validated and frozen.
#[derive(Debug, Clone)]
pub struct Roster {
    agents: BTreeMap<String, AgentConfig>,
    runner: RunnerSettings,
    approval_timeout: Duration,
}

impl Roster {
    /// Load built-in roles, overlay `agents.yaml` and the environment.
    pub fn load(ctx: &ProjectContext, overrides: &EnvOverrides) -> Result<Self> {
        let file = RosterFile::load(ctx.agents_config_path())?.unwrap_or_default();
        Self::build(ctx, file, overrides)
    }

    /// Build a roster from an already-parsed file.
    pub fn build(ctx: &ProjectContext, file: RosterFile, overrides: &EnvOverrides) -> Result<Self> {
        let mut specs = roles::builtin();
        for (key, spec) in &file.agents {
            specs.insert(key.clone(), spec.clone());
        }

        let remote_repo = overrides
            .remote_repo
            .clone()
            .or_else(|| file.remote_repo.clone());

        let mut agents = BTreeMap::new();
        for (key, mut spec) in specs {
            overrides.apply(&mut spec, &file);
            let config = AgentConfig::new(
                &key,
                spec,
                &file.defaults,
                &ctx.project_root,
                remote_repo.clone(),
            )?;
            agents.insert(key, config);
        }

        Ok(Self {
            agents,
            runner: file.runner,
            approval_timeout: Duration::from_secs(file.defaults.approval_timeout_seconds),
        })
    }

    pub fn agent(&self, key: &str) -> Option<&AgentConfig> {
        self.agents.get(key)
    }

    /// Look up an agent or explain which ones exist.
    pub fn require(&self, key: &str) -> Result<&AgentConfig> {
        self.agent(key).ok_or_else(|| {
            RosterError::UserError(format!(
                "agent '{}' is not configured.\nAvailable agents: {}",
                key,
                self.agents.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.values()
    }

    pub fn runner(&self) -> &RunnerSettings {
        &self.runner
    }

    pub fn approval_timeout(&self) -> Duration {
        self.approval_timeout
    }
}
