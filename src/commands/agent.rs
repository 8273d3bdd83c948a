//! Implementation of the `roster agent <NAME> ...` command.
//!
//! - `roster agent <NAME> --status` shows the agent's status
//! - `roster agent <NAME> <OPERATION> --<param> <value>...` runs an operation
//! - `... --dry-run` prints what would be dispatched without running it

use crate::cli::AgentArgs;
use crate::cli::operations::{OperationCall, parse_operation};
use crate::commands::status::print_status;
use crate::config::Roster;
use crate::context::ProjectContext;
use crate::dispatch::{CancelToken, DispatchPlan, TaskResult};
use crate::error::Result;
use crate::exit_codes;
use crate::facade::Agent;

/// Execute `roster agent`.
pub fn cmd_agent(ctx: &ProjectContext, roster: &Roster, args: AgentArgs) -> Result<i32> {
    let config = roster.require(&args.name)?;

    if args.status {
        let agent = Agent::from_roster(ctx, roster, config.key())?;
        print_status(&agent.status());
        return Ok(exit_codes::SUCCESS);
    }

    let call = match parse_operation(config, &args.operation)? {
        Ok(call) => call,
        Err(usage) => {
            // Help requests print to stdout and succeed; real usage errors
            // print to stderr.
            let code = if usage.use_stderr() {
                exit_codes::USER_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = usage.print();
            return Ok(code);
        }
    };

    let mut agent = Agent::from_roster(ctx, roster, config.key())?;
    if call.dry_run {
        let plan = agent.plan(&call.operation, call.params)?;
        print_plan(agent.config().name(), &plan);
        return Ok(exit_codes::SUCCESS);
    }

    run(&mut agent, call)
}

fn run(agent: &mut Agent, call: OperationCall) -> Result<i32> {
    let dangerous = agent
        .config()
        .operation(&call.operation)
        .is_some_and(|op| op.dangerous);

    println!(
        "Dispatching {} ({}): {}",
        agent.config().name(),
        agent.config().role(),
        call.operation
    );
    if dangerous {
        println!(
            "This operation requires approval; waiting up to {}s.",
            agent.gate().timeout().as_secs()
        );
        println!("Answer it from another terminal with `roster approvals list`.");
    }
    println!();

    let result = agent.perform(&call.operation, call.params, &CancelToken::new())?;
    print_result(&result);
    Ok(result.status_code())
}

fn print_plan(agent: &str, plan: &DispatchPlan) {
    println!("[DRY RUN] Would dispatch {}: {}", agent, plan.operation);
    println!();
    println!("  Timeout:   {}s", plan.timeout.as_secs());
    println!(
        "  Approval:  {}",
        if plan.needs_approval {
            "required"
        } else {
            "not required"
        }
    );
    println!(
        "  Tools:     {}",
        plan.restrictions
            .tools
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    let allowed = plan.restrictions.allowed_tools_arg();
    if !allowed.is_empty() {
        println!("  Allowed:   {}", allowed);
    }
    let disallowed = plan.restrictions.disallowed_tools_arg();
    if !disallowed.is_empty() {
        println!("  Blocked:   {}", disallowed);
    }
    println!();
    println!("Instruction:");
    for line in plan.instruction.lines() {
        println!("  {}", line);
    }
}

fn print_result(result: &TaskResult) {
    if !result.output.is_empty() {
        print!("{}", result.output);
        if !result.output.ends_with('\n') {
            println!();
        }
    }

    match &result.error {
        None => println!(
            "{} completed in {:.1}s",
            result.operation,
            result.duration.as_secs_f64()
        ),
        Some(error) => {
            eprintln!("Error [{}]: {}", error.kind(), error);
            if let Some(caveat) = &result.caveat {
                eprintln!("Note: {}", caveat);
            }
        }
    }
}
