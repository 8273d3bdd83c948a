//! Command implementations for roster.
//!
//! Routes parsed CLI commands to their handlers. Handlers print to stdout and
//! return the process exit code; errors bubble up to `main`.

mod agent;
mod agents;
mod approvals;
mod status;

use crate::cli::{ApprovalsAction, ApprovalsCommand, Cli, Command};
use crate::config::{EnvOverrides, Roster};
use crate::context::ProjectContext;
use crate::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let ctx = ProjectContext::resolve(cli.project_root.as_deref())?;
    tracing::debug!(root = %ctx.project_root.display(), "resolved project root");

    match cli.command {
        // Approvals only touch the mailbox; no roster needed.
        Command::Approvals(cmd) => dispatch_approvals(&ctx, cmd),
        Command::Agents => agents::cmd_agents(&load_roster(&ctx)?),
        Command::Agent(args) => agent::cmd_agent(&ctx, &load_roster(&ctx)?, args),
        Command::Status => status::cmd_status(&ctx, &load_roster(&ctx)?),
    }
}

/// Dispatch approval subcommands.
fn dispatch_approvals(ctx: &ProjectContext, cmd: ApprovalsCommand) -> Result<i32> {
    match cmd.action {
        ApprovalsAction::List => approvals::cmd_list(ctx),
        ApprovalsAction::Resolve(args) => approvals::cmd_resolve(ctx, args),
    }
}

fn load_roster(ctx: &ProjectContext) -> Result<Roster> {
    let overrides = EnvOverrides::from_env()?;
    Roster::load(ctx, &overrides)
}
