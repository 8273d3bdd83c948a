//! Best-effort notifications for agent outcomes.
//!
//! A `Notifier` belongs to one agent and fans an event out to every enabled
//! channel: the append-only log file, a desktop notification, and SMS.
//! Delivery never fails the caller. File failures are traced and dropped;
//! desktop and SMS failures are written to the log file when that channel
//! is enabled, and traced either way.

mod event;
mod sinks;


pub use event::{Channel, NotificationEvent, Severity, read_last_event};
pub use sinks::{DesktopSink, FileSink, Sink, SmsSink, append_line};

use crate::config::NotificationSettings;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-channel outcome of one `notify` call. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// `None` when the channel is disabled.
    pub file: Option<bool>,
    pub desktop: Option<bool>,
    pub sms: Option<bool>,
}

/// Fans events out to the channels enabled for one agent.
pub struct Notifier {
    agent: String,
    settings: NotificationSettings,
    file: FileSink,
    desktop: Box<dyn Sink>,
    sms: Box<dyn Sink>,
    last: Mutex<Option<NotificationEvent>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("agent", &self.agent)
            .field("settings", &self.settings)
            .field("log_path", &self.file.path())
            .finish()
    }
}

impl Notifier {
    /// Create a notifier with the real desktop and SMS sinks.
    ///
    /// `default_log_path` is used unless the settings override it.
    pub fn new(agent: &str, settings: &NotificationSettings, default_log_path: &Path) -> Self {
        let sms = SmsSink::new(settings.sms_address.clone());
        Self::with_sinks(
            agent,
            settings,
            default_log_path,
            Box::new(DesktopSink::default()),
            Box::new(sms),
        )
    }

    /// Create a notifier with custom desktop and SMS sinks.
    pub fn with_sinks(
        agent: &str,
        settings: &NotificationSettings,
        default_log_path: &Path,
        desktop: Box<dyn Sink>,
        sms: Box<dyn Sink>,
    ) -> Self {
        let log_path: PathBuf = settings
            .log_path
            .clone()
            .unwrap_or_else(|| default_log_path.to_path_buf());
        Self {
            agent: agent.to_string(),
            settings: settings.clone(),
            file: FileSink::new(log_path),
            desktop,
            sms,
            last: Mutex::new(None),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn log_path(&self) -> &Path {
        self.file.path()
    }

    /// Build and deliver an event for this agent.
    pub fn notify(&self, severity: Severity, message: impl Into<String>) -> DeliveryReport {
        let event = NotificationEvent::new(self.agent.clone(), severity, message);
        self.deliver(&event)
    }

    pub fn info(&self, message: impl Into<String>) -> DeliveryReport {
        self.notify(Severity::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> DeliveryReport {
        self.notify(Severity::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> DeliveryReport {
        self.notify(Severity::Error, message)
    }

    pub fn approval(&self, message: impl Into<String>) -> DeliveryReport {
        self.notify(Severity::Approval, message)
    }

    /// Deliver an event to every enabled channel.
    pub fn deliver(&self, event: &NotificationEvent) -> DeliveryReport {
        tracing::debug!(
            agent = %event.agent,
            severity = %event.severity,
            message = %event.message,
            "notification"
        );

        let mut report = DeliveryReport::default();

        if self.settings.file {
            report.file = Some(self.write_file(&event.on(Channel::File)));
        }
        if self.settings.desktop {
            report.desktop = Some(self.deliver_secondary(&*self.desktop, &event.on(Channel::Desktop)));
        }
        if self.settings.sms {
            report.sms = Some(self.deliver_secondary(&*self.sms, &event.on(Channel::Sms)));
        }

        if let Ok(mut last) = self.last.lock() {
            *last = Some(event.clone());
        }
        report
    }

    /// The last event this notifier delivered, if any.
    pub fn last_event(&self) -> Option<NotificationEvent> {
        self.last.lock().ok().and_then(|last| last.clone())
    }

    fn write_file(&self, event: &NotificationEvent) -> bool {
        match self.file.deliver(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "failed to write notification log"
                );
                false
            }
        }
    }

    fn deliver_secondary(&self, sink: &dyn Sink, event: &NotificationEvent) -> bool {
        match sink.deliver(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(channel = %event.channel, error = %e, "notification delivery failed");
                if self.settings.file {
                    let failure = NotificationEvent {
                        channel: event.channel,
                        severity: Severity::Warn,
                        message: format!("{} delivery failed: {}", event.channel, e),
                        ..event.clone()
                    };
                    let _ = self.file.deliver(&failure);
                }
                false
            }
        }
    }
}
