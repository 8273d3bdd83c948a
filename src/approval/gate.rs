//! In-process approval gate with optional mailbox for external resolvers.

use super::clock::{self, Clock};
use super::{
    ApprovalOutcome, ApprovalRequest, ApprovalState, Decision, actor_string, mailbox,
    new_request_id,
};
use crate::dispatch::CancelToken;
use crate::error::{Result, RosterError};
use crate::notify::Notifier;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal requests remembered so late resolvers get `AlreadyResolved`.
pub(crate) const SETTLED_CAPACITY: usize = 64;

/// Reason recorded when the waiting task is cancelled.
pub(crate) const CANCELLED_REASON: &str = "cancelled while waiting for approval";

#[derive(Debug, Default)]
struct GateState {
    /// Pending requests only.
    requests: HashMap<String, ApprovalRequest>,
    /// Most recent terminal requests, oldest first.
    settled: VecDeque<ApprovalRequest>,
}

impl GateState {
    fn settled(&self, id: &str) -> Option<&ApprovalRequest> {
        self.settled.iter().find(|r| r.id == id)
    }
}

/// Gates dangerous operations on a human decision.
///
/// One gate belongs to one agent. Requests are resolved in-process with
/// [`ApprovalGate::resolve`], through the mailbox directory when one is
/// configured, or denied once the clock passes their deadline.
pub struct ApprovalGate {
    agent: String,
    timeout: Duration,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    mailbox: Option<PathBuf>,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("agent", &self.agent)
            .field("timeout", &self.timeout)
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

impl ApprovalGate {
    pub fn new(
        agent: &str,
        timeout: Duration,
        clock: Arc<dyn Clock>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            agent: agent.to_string(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock,
            notifier,
            mailbox: None,
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
        }
    }

    /// Publish requests to `dir` so other processes can resolve them.
    pub fn with_mailbox(mut self, dir: PathBuf) -> Self {
        self.mailbox = Some(dir);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn mailbox(&self) -> Option<&Path> {
        self.mailbox.as_deref()
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Ask for approval and block until the request is terminal.
    ///
    /// Non-dangerous operations are approved immediately without creating a
    /// request or emitting a notification. Cancelling `cancel` while waiting
    /// denies the request and returns an outcome marked `cancelled`.
    pub fn request(
        &self,
        description: &str,
        dangerous: bool,
        cancel: &CancelToken,
    ) -> ApprovalOutcome {
        if !dangerous {
            return ApprovalOutcome::auto_approved();
        }
        let id = self.open(description);
        self.wait(&id, cancel)
    }

    /// Create a pending request and announce it. Returns the request id.
    pub fn open(&self, description: &str) -> String {
        let now = self.clock.now();
        let request = ApprovalRequest {
            id: new_request_id(),
            agent: self.agent.clone(),
            description: description.to_string(),
            dangerous: true,
            requested_by: actor_string(),
            created_at: now,
            expires_at: clock::add(now, self.timeout),
            state: ApprovalState::Pending,
            reason: None,
        };
        let id = request.id.clone();

        if let Some(dir) = &self.mailbox
            && let Err(e) = mailbox::publish(dir, &request)
        {
            tracing::warn!(id = %id, error = %e, "failed to publish approval request");
        }

        self.lock().requests.insert(id.clone(), request);

        tracing::info!(agent = %self.agent, id = %id, "approval requested");
        let resolve_hint = if self.mailbox.is_some() {
            format!(" (roster approvals resolve {} approve|deny)", id)
        } else {
            String::new()
        };
        self.notifier.approval(format!(
            "approval required [{}]: {}{}",
            id, description, resolve_hint
        ));
        id
    }

    /// Block until `id` is approved, denied or `cancel` fires.
    ///
    /// An unknown id is reported as denied.
    pub fn wait(&self, id: &str, cancel: &CancelToken) -> ApprovalOutcome {
        let mut state = self.lock();
        let mut cancelled = false;
        loop {
            if let Some(request) = state.requests.get(id) {
                if cancel.is_cancelled() {
                    tracing::info!(id = %id, "approval wait cancelled");
                    let reason = Some(CANCELLED_REASON.to_string());
                    Self::settle(&mut state, id, ApprovalState::Denied, reason);
                    cancelled = true;
                    self.changed.notify_all();
                    continue;
                }
                if let Some(decision) = self.mailbox_decision(id) {
                    Self::settle(&mut state, id, decision.decision.state(), decision.reason);
                    self.changed.notify_all();
                    continue;
                }
                if request.is_expired(self.clock.now()) {
                    tracing::warn!(id = %id, "approval timed out");
                    Self::settle(&mut state, id, ApprovalState::Denied, Some(self.timeout_reason()));
                    self.changed.notify_all();
                    continue;
                }

                state = match self.changed.wait_timeout(state, self.poll_interval) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
                continue;
            }

            let Some(request) = state.settled(id) else {
                return ApprovalOutcome {
                    id: Some(id.to_string()),
                    state: ApprovalState::Denied,
                    reason: Some(format!("unknown approval request '{}'", id)),
                    cancelled: false,
                };
            };
            let outcome = ApprovalOutcome {
                id: Some(request.id.clone()),
                state: request.state,
                reason: request.reason.clone(),
                cancelled,
            };
            if let Some(dir) = &self.mailbox {
                mailbox::remove(dir, id);
            }
            return outcome;
        }
    }

    /// Resolve a pending request in-process.
    pub fn resolve(&self, id: &str, decision: Decision, reason: Option<String>) -> Result<()> {
        let mut state = self.lock();
        let Some(request) = state.requests.get(id) else {
            return Err(match state.settled(id) {
                Some(_) => RosterError::AlreadyResolved(id.to_string()),
                None => RosterError::NotFound(id.to_string()),
            });
        };
        if request.is_expired(self.clock.now()) {
            return Err(RosterError::AlreadyResolved(id.to_string()));
        }

        // A decision may already sit in the mailbox; it won the race.
        if let Some(dir) = &self.mailbox {
            match mailbox::resolve(dir, id, decision, reason.clone(), self.clock.now()) {
                Ok(_) | Err(RosterError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Self::settle(&mut state, id, decision.state(), reason);
        tracing::info!(id = %id, state = %decision.state(), "approval resolved");
        self.changed.notify_all();
        Ok(())
    }

    /// Deny every pending request whose deadline has passed.
    pub fn expire_overdue(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let overdue: Vec<String> = state
            .requests
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.id.clone())
            .collect();
        for id in &overdue {
            Self::settle(&mut state, id, ApprovalState::Denied, Some(self.timeout_reason()));
        }
        if !overdue.is_empty() {
            self.changed.notify_all();
        }
        overdue.len()
    }

    /// Requests currently awaiting a decision.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let mut pending: Vec<_> = self.lock().requests.values().cloned().collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }

    pub fn pending_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// State of a pending or recently settled request.
    pub fn state_of(&self, id: &str) -> Option<ApprovalState> {
        let state = self.lock();
        state
            .requests
            .get(id)
            .or_else(|| state.settled(id))
            .map(|r| r.state)
    }

    #[cfg(test)]
    pub(crate) fn retained(&self) -> usize {
        let state = self.lock();
        state.requests.len() + state.settled.len()
    }

    fn timeout_reason(&self) -> String {
        format!(
            "timed out after {}s waiting for approval",
            self.timeout.as_secs()
        )
    }

    fn mailbox_decision(&self, id: &str) -> Option<mailbox::DecisionRecord> {
        self.mailbox
            .as_deref()
            .and_then(|dir| mailbox::read_decision(dir, id))
    }

    /// Move a pending request to its terminal state and out of the live map.
    fn settle(state: &mut GateState, id: &str, to: ApprovalState, reason: Option<String>) {
        let Some(mut request) = state.requests.remove(id) else {
            return;
        };
        request.state = to;
        request.reason = reason;
        state.settled.push_back(request);
        while state.settled.len() > SETTLED_CAPACITY {
            state.settled.pop_front();
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
