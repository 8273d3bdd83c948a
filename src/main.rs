//! Roster: configuration-driven dispatch of named LLM agents.
//!
//! This is the main entry point for the `roster` CLI. It parses arguments,
//! installs logging, dispatches to the command handler and maps errors to
//! exit codes.

mod approval;
mod cli;
mod commands;
mod config;
mod context;
mod dispatch;
mod error;
mod exit_codes;
mod facade;
mod fs;
mod logging;
mod notify;
mod policy;
mod remote;
mod roles;
mod template;
mod vcs;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let outcome = logging::init_logging(cli.verbose).and_then(|()| commands::dispatch(cli));
    match outcome {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
