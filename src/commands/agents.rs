//! Implementation of the `roster agents` command.

use crate::cli::operations::operation_params;
use crate::config::Roster;
use crate::error::Result;
use crate::exit_codes;

/// List every configured agent with its operations.
pub fn cmd_agents(roster: &Roster) -> Result<i32> {
    println!("Agents");
    println!("======");

    for config in roster.agents() {
        println!();
        println!("{} - {} ({})", config.key(), config.name(), config.role());
        for (name, op) in config.operations() {
            let flags = operation_params(&op.template)?
                .into_iter()
                .map(|p| format!("--{} <{}>", p, p.to_uppercase()))
                .collect::<Vec<_>>()
                .join(" ");
            let marker = if op.dangerous { "  [requires approval]" } else { "" };
            println!("  {:<20} {}{}", name, op.description, marker);
            if !flags.is_empty() {
                println!("  {:<20} {}", "", flags);
            }
        }
    }

    println!();
    println!("Run an operation with: roster agent <NAME> <OPERATION> [--<param> <value>...]");
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvOverrides, RosterFile};
    use crate::context::ProjectContext;
    use tempfile::TempDir;

    #[test]
    fn lists_builtin_roles() {
        let temp = TempDir::new().unwrap();
        let ctx = ProjectContext::at(temp.path()).unwrap();
        let roster = Roster::build(&ctx, RosterFile::default(), &EnvOverrides::default()).unwrap();
        assert_eq!(cmd_agents(&roster).unwrap(), exit_codes::SUCCESS);
    }
}
