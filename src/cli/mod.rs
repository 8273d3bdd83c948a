//! CLI argument parsing for roster.
//!
//! The fixed command tree uses clap derive macros. Per-agent operations are
//! only known once the configuration is loaded, so `roster agent <NAME> ...`
//! captures the rest of the line and `operations` builds the matching clap
//! command at runtime.

pub mod operations;

use crate::approval::Decision;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Roster: dispatch tasks to a team of named LLM agents.
///
/// Each agent is a configuration record (role, allowed tools, shell-command
/// patterns, notification channels, named prompt operations). Dangerous
/// operations wait for human approval before anything runs.
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root (defaults to ROSTER_PROJECT_ROOT, then the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub project_root: Option<PathBuf>,

    /// Print debug diagnostics to stderr (ROSTER_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for roster.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured agents and their operations.
    Agents,

    /// Run an operation on an agent, or show its status.
    ///
    /// `roster agent <NAME> <OPERATION> [--<param> <value>...] [--dry-run]`
    /// runs a configured operation; every `{placeholder}` in its template is
    /// a required flag. `roster agent <NAME> <OPERATION> --help` lists them.
    Agent(AgentArgs),

    /// Inspect and resolve pending approvals.
    Approvals(ApprovalsCommand),

    /// Show pending approvals and the last notification for every agent.
    Status,
}

/// Arguments for the `agent` command.
#[derive(Parser, Debug)]
pub struct AgentArgs {
    /// Agent identifier (see `roster agents`).
    pub name: String,

    /// Show pending approvals and the last notification instead of running.
    #[arg(long)]
    pub status: bool,

    /// Operation name followed by its flags.
    #[arg(
        value_name = "OPERATION",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub operation: Vec<String>,
}

/// Approval subcommands.
#[derive(Parser, Debug)]
pub struct ApprovalsCommand {
    #[command(subcommand)]
    pub action: ApprovalsAction,
}

/// Available approval actions.
#[derive(Subcommand, Debug)]
pub enum ApprovalsAction {
    /// List requests waiting for a decision.
    List,

    /// Approve or deny a pending request.
    ///
    /// The waiting agent picks the decision up on its next poll. A request
    /// can only be resolved once.
    Resolve(ResolveArgs),
}

/// Arguments for `approvals resolve`.
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Approval request id (e.g. apr-1a2b3c4d).
    pub id: String,

    /// `approve` or `deny`.
    pub decision: Decision,

    /// Reason recorded with the decision.
    #[arg(long)]
    pub reason: Option<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_agents() {
        let cli = Cli::try_parse_from(["roster", "agents"]).unwrap();
        assert!(matches!(cli.command, Command::Agents));
        assert!(cli.project_root.is_none());
    }

    #[test]
    fn parse_global_project_root() {
        let cli = Cli::try_parse_from(["roster", "status", "--project-root", "/srv/app"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.project_root, Some(PathBuf::from("/srv/app")));
    }

    #[test]
    fn parse_agent_status() {
        let cli = Cli::try_parse_from(["roster", "agent", "quinn", "--status"]).unwrap();
        if let Command::Agent(args) = cli.command {
            assert_eq!(args.name, "quinn");
            assert!(args.status);
            assert!(args.operation.is_empty());
        } else {
            panic!("Expected Agent command");
        }
    }

    #[test]
    fn parse_agent_operation_keeps_trailing_flags() {
        let cli = Cli::try_parse_from([
            "roster",
            "agent",
            "sydney",
            "create-endpoint",
            "--method",
            "POST",
            "--path",
            "/users",
            "--dry-run",
        ])
        .unwrap();
        if let Command::Agent(args) = cli.command {
            assert_eq!(args.name, "sydney");
            assert!(!args.status);
            assert_eq!(
                args.operation,
                vec![
                    "create-endpoint",
                    "--method",
                    "POST",
                    "--path",
                    "/users",
                    "--dry-run"
                ]
            );
        } else {
            panic!("Expected Agent command");
        }
    }

    #[test]
    fn parse_approvals_list() {
        let cli = Cli::try_parse_from(["roster", "approvals", "list"]).unwrap();
        if let Command::Approvals(cmd) = cli.command {
            assert!(matches!(cmd.action, ApprovalsAction::List));
        } else {
            panic!("Expected Approvals command");
        }
    }

    #[test]
    fn parse_approvals_resolve() {
        let cli = Cli::try_parse_from([
            "roster",
            "approvals",
            "resolve",
            "apr-1a2b3c4d",
            "deny",
            "--reason",
            "change freeze",
        ])
        .unwrap();
        if let Command::Approvals(cmd) = cli.command {
            if let ApprovalsAction::Resolve(args) = cmd.action {
                assert_eq!(args.id, "apr-1a2b3c4d");
                assert_eq!(args.decision, Decision::Deny);
                assert_eq!(args.reason.as_deref(), Some("change freeze"));
            } else {
                panic!("Expected Resolve action");
            }
        } else {
            panic!("Expected Approvals command");
        }
    }

    #[test]
    fn parse_approvals_resolve_rejects_bad_decision() {
        let result = Cli::try_parse_from(["roster", "approvals", "resolve", "apr-1", "maybe"]);
        assert!(result.is_err());
    }
}
