//! Error types for roster.
//!
//! `RosterError` covers configuration, approval-gate misuse and I/O problems
//! that abort a command. Outcomes of a dispatch (denied, timed out, failed)
//! are not errors at this level; they travel inside a `TaskResult` so that
//! every run reports exactly one result.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for roster operations.
#[derive(Error, Debug)]
pub enum RosterError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// An agent configuration failed to load or validate.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// No pending approval matches the given id.
    #[error("approval '{0}' not found")]
    NotFound(String),

    /// The approval was already approved or denied.
    #[error("approval '{0}' was already resolved")]
    AlreadyResolved(String),

    /// A tool or command outside the agent's allow-list was requested.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// A filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The version-control collaborator failed.
    #[error("version control failed: {0:#}")]
    Vcs(#[from] anyhow::Error),
}

impl RosterError {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RosterError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RosterError::UserError(_)
            | RosterError::ConfigError(_)
            | RosterError::NotFound(_)
            | RosterError::AlreadyResolved(_)
            | RosterError::PolicyViolation(_)
            | RosterError::Io { .. } => exit_codes::USER_ERROR,
            RosterError::Vcs(_) => exit_codes::PROCESS_FAILURE,
        }
    }
}

/// Result type alias for roster operations.
pub type Result<T> = std::result::Result<T, RosterError>;
