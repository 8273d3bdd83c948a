//! Runtime-built clap commands for an agent's operations.
//!
//! One subcommand per configured operation, one required `--<name>` flag per
//! template placeholder (ambient and issue variables excluded), plus
//! `--dry-run`.

use crate::config::AgentConfig;
use crate::dispatch::AMBIENT_VARS;
use crate::error::{Result, RosterError};
use crate::remote::ISSUE_VARS;
use crate::template;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::{BTreeSet, HashMap};

const DRY_RUN: &str = "dry-run";

/// A parsed `roster agent <NAME> <OPERATION> ...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCall {
    pub operation: String,
    pub params: HashMap<String, String>,
    pub dry_run: bool,
}

/// Parameters an operation's template asks the caller for.
pub fn operation_params(template_text: &str) -> Result<BTreeSet<String>> {
    let mut names = template::placeholders(template_text)
        .map_err(|e| RosterError::ConfigError(e.to_string()))?;
    names.retain(|name| {
        !AMBIENT_VARS.contains(&name.as_str()) && !ISSUE_VARS.contains(&name.as_str())
    });
    Ok(names)
}

/// Build the clap command for one agent.
pub fn agent_command(config: &AgentConfig) -> Result<Command> {
    let mut cmd = Command::new(config.key().to_string())
        .about(format!("{} ({})", config.name(), config.role()))
        .subcommand_required(true)
        .arg_required_else_help(true);

    for (name, op) in config.operations() {
        let mut sub = Command::new(name.clone()).arg(
            Arg::new(DRY_RUN)
                .long(DRY_RUN)
                .action(ArgAction::SetTrue)
                .help("Show the rendered instruction and restrictions without running"),
        );
        let about = if op.dangerous {
            format!("{} [requires approval]", op.description)
        } else {
            op.description.clone()
        };
        sub = sub.about(about);

        for param in operation_params(&op.template)? {
            if param == DRY_RUN || param == "help" {
                return Err(RosterError::ConfigError(format!(
                    "operation '{}' of agent '{}' uses reserved parameter name '{}'",
                    name,
                    config.key(),
                    param
                )));
            }
            sub = sub.arg(
                Arg::new(param.clone())
                    .long(param.clone())
                    .value_name(param.to_uppercase())
                    .required(true),
            );
        }
        cmd = cmd.subcommand(sub);
    }
    Ok(cmd)
}

/// Parse the arguments following the agent name.
///
/// Help and usage errors come back as `clap::Error` so the caller can print
/// them with clap's formatting and exit status.
pub fn parse_operation(
    config: &AgentConfig,
    args: &[String],
) -> Result<std::result::Result<OperationCall, clap::Error>> {
    let cmd = agent_command(config)?;
    let argv = std::iter::once(config.key().to_string()).chain(args.iter().cloned());
    Ok(cmd.try_get_matches_from(argv).and_then(|matches| {
        call_from(&matches).ok_or_else(|| {
            clap::Error::new(clap::error::ErrorKind::MissingSubcommand)
        })
    }))
}

fn call_from(matches: &ArgMatches) -> Option<OperationCall> {
    let (operation, sub) = matches.subcommand()?;
    let params = sub
        .ids()
        .filter(|id| id.as_str() != DRY_RUN)
        .filter_map(|id| {
            sub.get_one::<String>(id.as_str())
                .map(|value| (id.as_str().to_string(), value.clone()))
        })
        .collect();
    Some(OperationCall {
        operation: operation.to_string(),
        params,
        dry_run: sub.get_flag(DRY_RUN),
    })
}
