//! Tests for agent configuration.

use crate::config::{
    AgentConfig, AgentSpec, Defaults, EnvOverrides, OperationSpec, PermissionMode, Roster,
    RosterFile,
};
use crate::context::ProjectContext;
use crate::error::RosterError;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

fn build(spec: AgentSpec) -> Result<AgentConfig, RosterError> {
    AgentConfig::new("dev", spec, &Defaults::default(), Path::new("/work"), None)
}

#[test]
fn new_applies_defaults_and_adds_work_operation() {
    let config = build(AgentSpec::new("Dev", "Developer")).unwrap();

    assert_eq!(config.key(), "dev");
    assert_eq!(config.name(), "Dev");
    assert_eq!(config.timeout_seconds(), 600);
    assert_eq!(config.permission_mode(), PermissionMode::AcceptEdits);
    assert!(config.allowed_tools().contains("Bash"));
    assert!(config.notifications().file);
    assert!(!config.notifications().desktop);
    assert_eq!(config.project_root(), Path::new("/work"));
    assert_eq!(config.operation("work").unwrap().template, "{task}");
}

#[test]
fn empty_name_or_role_is_rejected() {
    let err = build(AgentSpec::new("", "Developer")).unwrap_err();
    assert!(err.to_string().contains("empty name"));

    let err = build(AgentSpec::new("Dev", "  ")).unwrap_err();
    assert!(err.to_string().contains("empty role"));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.timeout_seconds = Some(0);
    assert!(matches!(build(spec), Err(RosterError::ConfigError(_))));
}

#[test]
fn operation_tools_must_be_subset() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.allowed_tools = vec!["Read".to_string()];
    spec.operations.insert(
        "edit".to_string(),
        OperationSpec::new("Edit", "Edit {file}").with_tools(&["Read", "Write"]),
    );
    let err = build(spec).unwrap_err();
    assert!(err.to_string().contains("'Write' outside"));
}

#[test]
fn malformed_operation_template_is_rejected() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations
        .insert("broken".to_string(), OperationSpec::new("Broken", "Do {thing"));
    let err = build(spec).unwrap_err();
    assert!(err.to_string().contains("operation 'broken'"));
}

#[test]
fn commit_placeholders_must_be_known() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations.insert(
        "edit".to_string(),
        OperationSpec::new("Edit", "Edit {file}").with_commit("Edit {file} for {ticket}"),
    );
    let err = build(spec).unwrap_err();
    assert!(matches!(err, RosterError::ConfigError(_)));
    assert!(err.to_string().contains("'{ticket}'"), "{}", err);
}

#[test]
fn commit_may_use_ambient_variables() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations.insert(
        "edit".to_string(),
        OperationSpec::new("Edit", "Edit {file}")
            .with_commit("[{role}] {agent} edited {file} in {repo} at {project_root}"),
    );
    assert!(build(spec).is_ok());
}

#[test]
fn issue_variables_need_an_issue_parameter() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations.insert(
        "fix".to_string(),
        OperationSpec::new("Fix", "Fix #{issue}: {issue_title}"),
    );
    let err = build(spec).unwrap_err();
    assert!(err.to_string().contains("no issue parameter"), "{}", err);

    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations.insert(
        "fix".to_string(),
        OperationSpec::new("Fix", "Fix #{issue}: {issue_title}")
            .with_issue("issue")
            .with_commit("Fix: {issue_title}"),
    );
    assert!(build(spec).is_ok());
}

#[test]
fn issue_parameter_must_be_a_placeholder() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations.insert(
        "fix".to_string(),
        OperationSpec::new("Fix", "Fix {bug}").with_issue("issue"),
    );
    let err = build(spec).unwrap_err();
    assert!(err.to_string().contains("issue parameter 'issue'"), "{}", err);
}

#[test]
fn issue_commit_variables_need_an_issue_bound_operation() {
    let mut spec = AgentSpec::new("Dev", "Developer");
    spec.operations.insert(
        "fix".to_string(),
        OperationSpec::new("Fix", "Fix {bug}").with_commit("Fix {issue_title}"),
    );
    assert!(matches!(build(spec), Err(RosterError::ConfigError(_))));
}

#[test]
fn blank_remote_repo_is_dropped() {
    let config = AgentConfig::new(
        "dev",
        AgentSpec::new("Dev", "Developer"),
        &Defaults::default(),
        Path::new("/work"),
        Some("  ".to_string()),
    )
    .unwrap();
    assert_eq!(config.remote_repo(), None);
}

#[test]
fn parse_minimal_yaml() {
    let file = RosterFile::from_yaml("").unwrap();
    assert_eq!(file.defaults.timeout_seconds, 600);
    assert_eq!(file.defaults.approval_timeout_seconds, 900);
    assert_eq!(file.runner.program, "claude");
    assert!(file.agents.is_empty());
}

#[test]
fn parse_full_yaml() {
    let yaml = r#"
remote_repo: acme/api
defaults:
  timeout_seconds: 120
  approval_timeout_seconds: 30
  notifications:
    file: true
    desktop: true
runner:
  program: my-llm
  args: "--prompt {instruction}"
agents:
  dev:
    name: Dev
    role: Developer
    allowed_tools: [Read, Bash]
    allowed_commands: ["cargo *"]
    permission_mode: accept-all
    operations:
      create-endpoint:
        description: Create an endpoint
        template: "Create endpoint {method} {path}"
      drop-table:
        template: "Drop {table}"
        dangerous: true
future_field: kept
"#;
    let file = RosterFile::from_yaml(yaml).unwrap();
    assert_eq!(file.remote_repo.as_deref(), Some("acme/api"));
    assert_eq!(file.defaults.timeout_seconds, 120);
    assert!(file.defaults.notifications.desktop);
    assert_eq!(file.runner.program, "my-llm");
    assert!(file.extra.contains_key("future_field"));

    let dev = &file.agents["dev"];
    assert_eq!(dev.allowed_tools, vec!["Read", "Bash"]);
    assert_eq!(dev.permission_mode, PermissionMode::AcceptAll);
    assert!(dev.operations["drop-table"].dangerous);
    assert!(!dev.operations["create-endpoint"].dangerous);
}

#[test]
fn invalid_yaml_values_are_rejected() {
    assert!(RosterFile::from_yaml("defaults:\n  timeout_seconds: 0\n").is_err());
    assert!(RosterFile::from_yaml("runner:\n  program: ''\n").is_err());
    assert!(RosterFile::from_yaml("runner:\n  args: \"unterminated '\"\n").is_err());
    assert!(RosterFile::from_yaml("agents: [1, 2]").is_err());
}

#[test]
fn yaml_roundtrip_preserves_agents() {
    let mut file = RosterFile::default();
    file.agents
        .insert("dev".to_string(), AgentSpec::new("Dev", "Developer"));
    let yaml = file.to_yaml().unwrap();
    let parsed = RosterFile::from_yaml(&yaml).unwrap();
    assert_eq!(parsed.agents["dev"], file.agents["dev"]);
}

#[test]
fn env_overrides_parse_flags_and_timeout() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("ROSTER_REMOTE_REPO", "acme/web"),
        ("ROSTER_NOTIFY_DESKTOP", "yes"),
        ("ROSTER_NOTIFY_FILE", "0"),
        ("ROSTER_TIMEOUT_SECONDS", "45"),
        ("ROSTER_SMS_ADDRESS", ""),
    ]);
    let o = EnvOverrides::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

    assert_eq!(o.remote_repo.as_deref(), Some("acme/web"));
    assert_eq!(o.notify_desktop, Some(true));
    assert_eq!(o.notify_file, Some(false));
    assert_eq!(o.notify_sms, None);
    assert_eq!(o.sms_address, None);
    assert_eq!(o.timeout_seconds, Some(45));
}

#[test]
fn env_overrides_reject_garbage() {
    let err = EnvOverrides::from_lookup(|k| {
        (k == "ROSTER_NOTIFY_SMS").then(|| "maybe".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("ROSTER_NOTIFY_SMS"));

    let err = EnvOverrides::from_lookup(|k| {
        (k == "ROSTER_TIMEOUT_SECONDS").then(|| "ten".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("ROSTER_TIMEOUT_SECONDS"));
}

#[test]
fn roster_merges_builtins_file_and_env() {
    let temp = TempDir::new().unwrap();
    let ctx = ProjectContext::at(temp.path()).unwrap();
    std::fs::create_dir_all(&ctx.state_dir).unwrap();
    std::fs::write(
        ctx.agents_config_path(),
        "remote_repo: acme/api\nagents:\n  tango:\n    name: Tango\n    role: Test Lead\n",
    )
    .unwrap();

    let overrides = EnvOverrides {
        notify_desktop: Some(true),
        timeout_seconds: Some(30),
        ..Default::default()
    };
    let roster = Roster::load(&ctx, &overrides).unwrap();

    let tango = roster.agent("tango").unwrap();
    assert_eq!(tango.role(), "Test Lead");
    assert_eq!(tango.operations().len(), 1, "file entry replaces the built-in");
    assert!(tango.notifications().desktop);
    assert_eq!(tango.timeout_seconds(), 30);
    assert_eq!(tango.remote_repo(), Some("acme/api"));

    let quinn = roster.agent("quinn").unwrap();
    assert!(quinn.operation("deploy-containers").is_some());
    assert_eq!(quinn.project_root(), temp.path());

    let err = roster.require("nobody").unwrap_err();
    assert!(err.to_string().contains("Available agents"));
}

#[test]
fn roster_without_file_uses_builtins() {
    let temp = TempDir::new().unwrap();
    let ctx = ProjectContext::at(temp.path()).unwrap();
    let roster = Roster::load(&ctx, &EnvOverrides::default()).unwrap();
    assert!(roster.agents().count() >= 4);
    assert_eq!(roster.approval_timeout().as_secs(), 900);
}
