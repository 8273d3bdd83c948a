//! Implementation of the `roster approvals` commands.
//!
//! Both commands work on the file mailbox under `.roster/approvals/`, so they
//! can answer an agent that is blocked in another process.

use crate::approval::{ApprovalRequest, Decision, mailbox};
use crate::cli::ResolveArgs;
use crate::context::ProjectContext;
use crate::error::Result;
use crate::exit_codes;
use chrono::{DateTime, Utc};

/// Execute `roster approvals list`.
pub fn cmd_list(ctx: &ProjectContext) -> Result<i32> {
    let dir = ctx.approvals_dir();
    let now = Utc::now();

    let swept = mailbox::sweep_expired(&dir, now)?;
    if swept > 0 {
        tracing::debug!(swept, "removed expired approval requests");
    }

    let pending = mailbox::pending(&dir, now)?;
    if pending.is_empty() {
        println!("No pending approvals.");
        return Ok(exit_codes::SUCCESS);
    }

    println!("Pending approvals ({}):", pending.len());
    println!();
    for request in &pending {
        print_request(request, now);
    }
    println!("Resolve with: roster approvals resolve <ID> approve|deny [--reason <TEXT>]");
    Ok(exit_codes::SUCCESS)
}

/// Execute `roster approvals resolve`.
pub fn cmd_resolve(ctx: &ProjectContext, args: ResolveArgs) -> Result<i32> {
    let dir = ctx.approvals_dir();
    let request = mailbox::read_request(&dir, &args.id);
    let record = mailbox::resolve(&dir, &args.id, args.decision, args.reason, Utc::now())?;

    let verb = match record.decision {
        Decision::Approve => "Approved",
        Decision::Deny => "Denied",
    };
    match request {
        Some(request) => println!(
            "{} {} ({}: {})",
            verb, args.id, request.agent, request.description
        ),
        None => println!("{} {}", verb, args.id),
    }
    if let Some(reason) = &record.reason {
        println!("  Reason: {}", reason);
    }
    Ok(exit_codes::SUCCESS)
}

fn print_request(request: &ApprovalRequest, now: DateTime<Utc>) {
    println!("  {}  {}", request.id, request.agent);
    println!("      {}", request.description);
    println!(
        "      requested by {} {} ago, expires in {}",
        request.requested_by,
        human_duration(now - request.created_at),
        human_duration(request.expires_at - now)
    );
    println!();
}

fn human_duration(delta: chrono::Duration) -> String {
    let secs = delta.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
