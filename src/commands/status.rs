//! Implementation of the `roster status` command.
//!
//! Shows, per agent, how many approvals are waiting and the last
//! notification it emitted. Everything is read from the mailbox and the
//! notification log; no agent process is started.

use crate::config::Roster;
use crate::context::ProjectContext;
use crate::error::Result;
use crate::exit_codes;
use crate::facade::{Agent, AgentStatus};

/// Execute `roster status`.
pub fn cmd_status(ctx: &ProjectContext, roster: &Roster) -> Result<i32> {
    println!("Roster Status");
    println!("=============");
    println!();
    println!("Project: {}", ctx.project_root.display());

    let mut waiting = 0;
    for config in roster.agents() {
        let status = Agent::from_roster(ctx, roster, config.key())?.status();
        waiting += status.pending_approvals;
        println!();
        print_status(&status);
    }

    println!();
    if waiting > 0 {
        println!(
            "{} approval(s) waiting. Run `roster approvals list` to review them.",
            waiting
        );
    } else {
        println!("No approvals waiting.");
    }
    Ok(exit_codes::SUCCESS)
}

/// Print one agent's status block.
pub fn print_status(status: &AgentStatus) {
    println!("{} ({}) - {}", status.name, status.key, status.role);
    println!("  Pending approvals: {}", status.pending_approvals);
    if status.tasks_completed > 0 {
        println!(
            "  Tasks:             {} completed, {} succeeded",
            status.tasks_completed, status.tasks_succeeded
        );
    }
    if let Some(remote) = &status.remote_repo {
        println!("  Remote:            {}", remote);
    }
    match &status.last_notification {
        Some(event) => println!("  Last notification: {}", event.summary()),
        None => println!("  Last notification: (none)"),
    }
}
