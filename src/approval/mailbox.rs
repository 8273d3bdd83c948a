//! File mailbox for resolving approvals from outside the waiting process.
//!
//! # Layout
//!
//! ```text
//! .roster/approvals/
//!   apr-1a2b3c4d.pending.json    # ApprovalRequest, written by the gate
//!   apr-1a2b3c4d.decision.json   # DecisionRecord, written once by a resolver
//! ```
//!
//! The gate polls for the decision file and deletes both files once the
//! request is terminal. Nothing here survives as durable state: entries
//! whose deadline has passed are ignored and swept.

use super::{ApprovalRequest, Decision, actor_string};
use crate::error::{Result, RosterError};
use crate::fs::{atomic_create, atomic_write};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PENDING_SUFFIX: &str = ".pending.json";
const DECISION_SUFFIX: &str = ".decision.json";

/// A resolver's answer as written to the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

fn pending_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}{}", id, PENDING_SUFFIX))
}

fn decision_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}{}", id, DECISION_SUFFIX))
}

/// Publish a pending request.
pub fn publish(dir: &Path, request: &ApprovalRequest) -> Result<()> {
    let json = serde_json::to_string_pretty(request).map_err(|e| {
        RosterError::UserError(format!("failed to serialize approval request: {}", e))
    })?;
    atomic_write(pending_path(dir, &request.id), json.as_bytes())
}

/// Read a decision for `id`, if a resolver has written one.
///
/// An unreadable or unparsable decision file is treated as absent.
pub fn read_decision(dir: &Path, id: &str) -> Option<DecisionRecord> {
    let content = fs::read_to_string(decision_path(dir, id)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Read a published request.
pub fn read_request(dir: &Path, id: &str) -> Option<ApprovalRequest> {
    let content = fs::read_to_string(pending_path(dir, id)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Resolve a pending request from another process.
///
/// Fails with `NotFound` if no such request is published, and with
/// `AlreadyResolved` if a decision already exists or the request's deadline
/// has passed (it was or will be denied by timeout).
pub fn resolve(
    dir: &Path,
    id: &str,
    decision: Decision,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<DecisionRecord> {
    let request = read_request(dir, id).ok_or_else(|| RosterError::NotFound(id.to_string()))?;
    if request.is_expired(now) {
        return Err(RosterError::AlreadyResolved(id.to_string()));
    }

    let record = DecisionRecord {
        decision,
        reason,
        resolved_by: actor_string(),
        resolved_at: now,
    };
    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| RosterError::UserError(format!("failed to serialize decision: {}", e)))?;

    if atomic_create(decision_path(dir, id), json.as_bytes())? {
        Ok(record)
    } else {
        Err(RosterError::AlreadyResolved(id.to_string()))
    }
}

/// Remove both files for `id`. Missing files are fine.
pub fn remove(dir: &Path, id: &str) {
    let _ = fs::remove_file(pending_path(dir, id));
    let _ = fs::remove_file(decision_path(dir, id));
}

fn published(dir: &Path) -> Result<Vec<ApprovalRequest>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| {
        RosterError::io(
            format!("failed to read approvals directory '{}'", dir.display()),
            e,
        )
    })?;

    let mut requests = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(id) = name.strip_suffix(PENDING_SUFFIX)
            && let Some(request) = read_request(dir, id)
        {
            requests.push(request);
        }
    }
    requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(requests)
}

/// Requests still awaiting a decision at `now`, oldest first.
pub fn pending(dir: &Path, now: DateTime<Utc>) -> Result<Vec<ApprovalRequest>> {
    Ok(published(dir)?
        .into_iter()
        .filter(|r| !r.is_expired(now) && !decision_path(dir, &r.id).exists())
        .collect())
}

/// Delete entries whose deadline has passed. Returns how many were removed.
pub fn sweep_expired(dir: &Path, now: DateTime<Utc>) -> Result<usize> {
    let expired: Vec<_> = published(dir)?
        .into_iter()
        .filter(|r| r.is_expired(now))
        .collect();
    for request in &expired {
        remove(dir, &request.id);
    }
    Ok(expired.len())
}
