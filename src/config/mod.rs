//! Agent configuration for roster.
//!
//! Agents come from the built-in roles plus `.roster/agents.yaml`, with a
//! small set of `ROSTER_*` environment overrides applied once at load time.
//! Parsing is forward-compatible (unknown fields are kept, not rejected).

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

pub use model::{AgentConfig, AgentSpec, RosterFile, WORK_OPERATION};
pub use operations::{EnvOverrides, Roster};
pub use types::{
    Defaults, NotificationSettings, OperationSpec, PermissionMode, RunnerSettings,
};
