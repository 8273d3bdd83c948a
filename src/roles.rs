//! Built-in agent roles.
//!
//! Each role is plain data: an identity, a tool and command allow-list, a
//! system prompt and a handful of named operations. Entries with the same key
//! in `agents.yaml` replace these wholesale.

use crate::config::{AgentSpec, OperationSpec, PermissionMode};
use std::collections::BTreeMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// All built-in roles keyed by CLI identifier.
pub fn builtin() -> BTreeMap<String, AgentSpec> {
    BTreeMap::from([
        ("sydney".to_string(), full_stack_developer()),
        ("tango".to_string(), qa_tester()),
        ("quinn".to_string(), network_engineer()),
        ("valentina".to_string(), technical_writer()),
    ])
}

fn full_stack_developer() -> AgentSpec {
    let mut spec = AgentSpec::new("Sydney", "Full Stack Developer");
    spec.allowed_commands = strings(&[
        "git *", "gh *", "python *", "pip *", "npm *", "npx *", "cargo *", "docker *",
    ]);
    spec.system_prompt = "You are Sydney, a full stack developer. You build APIs, services \
        and UI components with tests, keep changes small and reviewable, and follow the \
        conventions already present in the codebase."
        .to_string();
    spec.operations = BTreeMap::from([
        (
            "create-endpoint".to_string(),
            OperationSpec::new(
                "Create an HTTP endpoint",
                "Create endpoint {method} {path}\n\n\
                 Follow the existing routing and validation patterns. Add request/response \
                 types, error handling and tests for the happy path and the main failure cases.",
            )
            .with_commit("Add {method} {path} endpoint"),
        ),
        (
            "add-migration".to_string(),
            OperationSpec::new(
                "Write a database migration",
                "Write a reversible database migration: {description}\n\n\
                 Include both the up and down steps and note any data backfill required.",
            )
            .dangerous(),
        ),
        (
            "fix-bug".to_string(),
            OperationSpec::new(
                "Fix a reported bug from the issue tracker",
                "Fix issue #{issue}: {issue_title}\n\n{issue_body}\n\n\
                 Reproduce it with a failing test first, then fix the root cause and keep \
                 the test.",
            )
            .with_issue("issue")
            .with_commit("fix: {issue_title}"),
        ),
    ]);
    spec
}

fn qa_tester() -> AgentSpec {
    let mut spec = AgentSpec::new("Tango", "QA Tester");
    spec.allowed_commands = strings(&[
        "git *",
        "gh *",
        "pytest *",
        "python -m pytest *",
        "npm test*",
        "npm run test*",
        "npx vitest *",
        "npx jest *",
        "cargo test*",
        "coverage *",
    ]);
    spec.system_prompt = "You are Tango, a QA engineer. You write focused tests that pin down \
        behavior, report coverage gaps honestly, and never weaken an assertion to make a \
        test pass."
        .to_string();
    spec.operations = BTreeMap::from([
        (
            "write-test".to_string(),
            OperationSpec::new(
                "Write tests for a target",
                "Write {kind} tests for {target}. Cover edge cases and error paths, and run \
                 the suite to confirm the new tests pass.",
            )
            .with_commit("Add {kind} tests for {target}"),
        ),
        (
            "run-tests".to_string(),
            OperationSpec::new(
                "Run the test suite and report failures",
                "Run the tests under {path} with coverage and summarize failures with \
                 their likely cause. Do not modify source files.",
            )
            .with_tools(&["Read", "Glob", "Grep", "Bash"]),
        ),
        (
            "analyze-coverage".to_string(),
            OperationSpec::new(
                "Report untested code",
                "Analyze test coverage for {path} and list the untested branches worth \
                 covering first.",
            )
            .with_tools(&["Read", "Glob", "Grep", "Bash"]),
        ),
    ]);
    spec
}

fn network_engineer() -> AgentSpec {
    let mut spec = AgentSpec::new("Quinn", "Network Engineer & Deployment Specialist");
    spec.allowed_commands = strings(&[
        "git *",
        "gh *",
        "docker *",
        "docker-compose *",
        "kubectl *",
        "helm *",
        "ping *",
        "dig *",
        "curl *",
        "terraform *",
    ]);
    spec.permission_mode = PermissionMode::Manual;
    spec.system_prompt = "You are Quinn, a network engineer and deployment specialist. You \
        design networks, deploy containers and keep infrastructure changes reversible. Never \
        apply production changes that were not explicitly approved."
        .to_string();
    spec.operations = BTreeMap::from([
        (
            "design-network".to_string(),
            OperationSpec::new(
                "Design a network architecture",
                "Design network architecture for:\n\n{requirements}\n\n\
                 Include topology, IP addressing, firewall rules, VPN layout and failover. \
                 Produce a document only; do not apply anything.",
            )
            .with_tools(&["Read", "Write", "Glob", "Grep"]),
        ),
        (
            "deploy-containers".to_string(),
            OperationSpec::new(
                "Deploy containers from a compose file",
                "Deploy containers from {compose_file} to {environment}. Validate the \
                 compose file, pull images, deploy, verify health and report status.",
            )
            .dangerous(),
        ),
        (
            "configure-vpn".to_string(),
            OperationSpec::new(
                "Configure a VPN",
                "Configure a {vpn_type} VPN:\n\n{details}\n\n\
                 Generate server and client configuration plus firewall rules.",
            )
            .dangerous(),
        ),
    ]);
    spec
}

fn technical_writer() -> AgentSpec {
    let mut spec = AgentSpec::new("Valentina", "Technical Writer & Content Strategist");
    spec.allowed_tools = strings(&["Read", "Write", "Edit", "Glob", "Grep", "Bash"]);
    spec.allowed_commands = strings(&["git *", "gh *"]);
    spec.system_prompt = "You are Valentina, a technical writer. You write accurate, \
        example-driven documentation for the audience named in each request."
        .to_string();
    spec.operations = BTreeMap::from([
        (
            "write-docs".to_string(),
            OperationSpec::new(
                "Document a topic for an audience",
                "Write documentation about {topic} for {audience}. Verify every example \
                 against the code.",
            )
            .with_commit("Document {topic}"),
        ),
        (
            "review-docs".to_string(),
            OperationSpec::new(
                "Review existing documentation",
                "Review the documentation in {path} for accuracy and clarity and list \
                 concrete fixes.",
            )
            .with_tools(&["Read", "Glob", "Grep"]),
        ),
    ]);
    spec
}
