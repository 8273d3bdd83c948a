//! Human approval for dangerous operations.
//!
//! Each request moves through a small state machine:
//!
//! ```text
//! pending ──resolve(approve)──▶ approved
//!    │
//!    ├─────resolve(deny)──────▶ denied
//!    ├─────deadline passes────▶ denied ("timed out after Ns waiting for approval")
//!    └─────waiter cancelled───▶ denied ("cancelled while waiting for approval")
//! ```
//!
//! Both terminal states are final. Resolution arrives either in-process via
//! `ApprovalGate::resolve` or from another process through the file mailbox
//! (`roster approvals resolve <id> approve|deny`).

mod clock;
mod gate;
pub mod mailbox;


pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::ApprovalGate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Denied,
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalState::Pending => write!(f, "pending"),
            ApprovalState::Approved => write!(f, "approved"),
            ApprovalState::Denied => write!(f, "denied"),
        }
    }
}

/// A resolver's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn state(self) -> ApprovalState {
        match self {
            Decision::Approve => ApprovalState::Approved,
            Decision::Deny => ApprovalState::Denied,
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" | "yes" | "y" => Ok(Decision::Approve),
            "deny" | "denied" | "reject" | "no" | "n" => Ok(Decision::Deny),
            other => Err(format!(
                "invalid decision '{}' (expected 'approve' or 'deny')",
                other
            )),
        }
    }
}

/// A request for human sign-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub agent: String,
    pub description: String,
    pub dangerous: bool,
    /// `user@host` of the process that opened the request.
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: ApprovalState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Terminal answer handed back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    /// `None` when no request was needed (non-dangerous operation).
    pub id: Option<String>,
    pub state: ApprovalState,
    pub reason: Option<String>,
    /// The waiting task was cancelled before anyone decided.
    pub cancelled: bool,
}

impl ApprovalOutcome {
    pub(crate) fn auto_approved() -> Self {
        Self {
            id: None,
            state: ApprovalState::Approved,
            reason: None,
            cancelled: false,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.state == ApprovalState::Approved
    }
}

/// Generate a short request identifier.
pub(crate) fn new_request_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("apr-{}", &id[..8])
}

/// The `user@host` string recorded on requests and decisions.
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
