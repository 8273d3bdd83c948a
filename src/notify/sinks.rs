//! Delivery channels for notifications.

use super::event::{NotificationEvent, Severity};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How long a desktop or SMS helper may run before it is killed.
pub const SINK_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A destination for notification events.
pub trait Sink: Send + Sync {
    fn deliver(&self, event: &NotificationEvent) -> io::Result<()>;
}

/// Appends one line per event to a log file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn deliver(&self, event: &NotificationEvent) -> io::Result<()> {
        append_line(&self.path, &event.to_line())
    }
}

/// Append `line` plus a newline with a single write on an append-mode handle.
///
/// Every append-mode write lands at the current end of file, so concurrent
/// writers (threads or processes) interleave whole lines, never fragments.
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
}

/// Desktop notification via `osascript` on macOS and `notify-send` elsewhere.
#[derive(Debug, Clone)]
pub struct DesktopSink {
    timeout: Duration,
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self {
            timeout: SINK_TIMEOUT,
        }
    }
}

impl DesktopSink {
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Sink for DesktopSink {
    fn deliver(&self, event: &NotificationEvent) -> io::Result<()> {
        let title = title_for(event);
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                applescript_escape(&event.message),
                applescript_escape(&title)
            );
            run_bounded(Command::new("osascript").args(["-e", &script]), self.timeout)
        } else {
            run_bounded(
                Command::new("notify-send").args([&title, &event.message]),
                self.timeout,
            )
        }
    }
}

/// SMS through the macOS Messages app.
#[derive(Debug, Clone)]
pub struct SmsSink {
    address: Option<String>,
}

impl SmsSink {
    pub fn new(address: Option<String>) -> Self {
        Self { address }
    }
}

impl Sink for SmsSink {
    fn deliver(&self, event: &NotificationEvent) -> io::Result<()> {
        let address = self
            .address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no SMS address set"))?;
        if !cfg!(target_os = "macos") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "SMS delivery requires the macOS Messages app",
            ));
        }
        let text = format!("{}: {}", event.agent, event.message);
        let script = format!(
            "tell application \"Messages\"\n\
             set targetService to 1st account whose service type = iMessage\n\
             set targetBuddy to participant \"{}\" of targetService\n\
             send \"{}\" to targetBuddy\n\
             end tell",
            applescript_escape(address),
            applescript_escape(&text)
        );
        run_bounded(Command::new("osascript").args(["-e", &script]), SINK_TIMEOUT)
    }
}

fn title_for(event: &NotificationEvent) -> String {
    match event.severity {
        Severity::Error => format!("{} - Error", event.agent),
        Severity::Approval => format!("{} - Approval Needed", event.agent),
        _ => event.agent.clone(),
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Run a helper command, killing it if it outlives `timeout`.
fn run_bounded(command: &mut Command, timeout: Duration) -> io::Result<()> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {}ms", timeout.as_millis()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    if status.success() {
        return Ok(());
    }
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    Err(io::Error::other(format!(
        "exited with {:?}: {}",
        status.code(),
        stderr.trim()
    )))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn hung_helper_is_killed_at_the_deadline() {
        let start = Instant::now();
        let err = run_bounded(
            Command::new("sleep").arg("10"),
            Duration::from_millis(200),
        )
        .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn failing_helper_reports_stderr() {
        let err = run_bounded(
            Command::new("sh").args(["-c", "echo 'no display' >&2; exit 3"]),
            SINK_TIMEOUT,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Some(3)"), "{}", message);
        assert!(message.contains("no display"), "{}", message);
    }

    #[test]
    fn quick_helper_succeeds() {
        run_bounded(&mut Command::new("true"), SINK_TIMEOUT).unwrap();
    }
}
