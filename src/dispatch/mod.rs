//! Task dispatch: one generic pipeline for every agent.
//!
//! ```text
//! cancelled? ─▶ render template ─▶ resolve restrictions ─▶ approval gate
//!     (dangerous only) ─▶ cancelled? ─▶ invoke process ─▶ notify once ─▶ TaskResult
//! ```

mod cancel;
mod dispatcher;
mod process;
mod result;


pub use cancel::CancelToken;
pub use dispatcher::{DispatchPlan, DispatchRequest, Dispatcher};
pub use process::{CommandProcess, Ended, Invocation, LlmProcess, ProcessOutput};
pub use result::{INTERRUPTED_CAVEAT, TaskError, TaskRecord, TaskResult};

/// Variables every template can use without a parameter.
pub const AMBIENT_VARS: &[&str] = &["agent", "role", "project_root", "repo"];
