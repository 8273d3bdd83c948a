//! Notification events and their one-line text form.
//!
//! # Line Format
//!
//! ```text
//! 2026-10-19T14:03:11.402Z [file] [SUCCESS] Sydney: create-endpoint succeeded in 12.4s
//! ```
//!
//! Backslashes, carriage returns and newlines inside the message are escaped
//! so one event is always exactly one line.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\S+) \[(file|desktop|sms)\] \[(INFO|SUCCESS|WARN|ERROR|APPROVAL)\] (.+?): (.*)$",
    )
    .expect("Invalid notification line regex")
});

/// Where an event is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    File,
    Desktop,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::File => write!(f, "file"),
            Channel::Desktop => write!(f, "desktop"),
            Channel::Sms => write!(f, "sms"),
        }
    }
}

impl Channel {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Channel::File),
            "desktop" => Some(Channel::Desktop),
            "sms" => Some(Channel::Sms),
            _ => None,
        }
    }
}

/// How urgent an event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
    /// A human needs to resolve a pending approval.
    Approval,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Approval => write!(f, "APPROVAL"),
        }
    }
}

impl Severity {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Severity::Info),
            "SUCCESS" => Some(Severity::Success),
            "WARN" => Some(Severity::Warn),
            "ERROR" => Some(Severity::Error),
            "APPROVAL" => Some(Severity::Approval),
            _ => None,
        }
    }
}

/// One observable outcome, addressed to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub channel: Channel,
    pub severity: Severity,
    pub message: String,
}

impl NotificationEvent {
    /// Create an event for the file channel stamped with the current time.
    pub fn new(agent: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.into(),
            channel: Channel::File,
            severity,
            message: message.into(),
        }
    }

    /// The same event addressed to another channel.
    pub fn on(&self, channel: Channel) -> Self {
        Self {
            channel,
            ..self.clone()
        }
    }

    /// Serialize to a single line (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} [{}] [{}] {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.channel,
            self.severity,
            escape(&self.agent),
            escape(&self.message)
        )
    }

    /// Parse a line written by `to_line`. Returns `None` for malformed lines.
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = LINE_RE.captures(line)?;
        let timestamp = DateTime::parse_from_rfc3339(&caps[1])
            .ok()?
            .with_timezone(&Utc);
        Some(Self {
            timestamp,
            channel: Channel::parse(&caps[2])?,
            severity: Severity::parse(&caps[3])?,
            agent: unescape(&caps[4]),
            message: unescape(&caps[5]),
        })
    }

    /// Short human-readable summary for status output.
    pub fn summary(&self) -> String {
        format!(
            "{} {} [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.agent,
            self.severity,
            self.message
        )
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Read the most recent well-formed event from a notification log.
///
/// Optionally restricted to one agent. A missing or unreadable log yields
/// `None`.
pub fn read_last_event(path: &Path, agent: Option<&str>) -> Option<NotificationEvent> {
    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .rev()
        .filter_map(NotificationEvent::parse_line)
        .find(|e| agent.is_none_or(|a| e.agent == a))
}
