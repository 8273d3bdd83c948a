//! Diagnostic logging.
//!
//! Structured `tracing` output goes to stderr so it never mixes with command
//! output on stdout. The filter comes from `ROSTER_LOG` (for example
//! `ROSTER_LOG=roster=debug`), falling back to `warn`, or `debug` with
//! `--verbose`.

use crate::error::{Result, RosterError};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "ROSTER_LOG";

/// Build the filter: `ROSTER_LOG` if set, otherwise the default level.
pub fn build_env_filter(verbose: bool) -> Result<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives.trim())
            .map_err(|e| RosterError::ConfigError(format!("invalid {}: {}", LOG_ENV, e))),
        _ => Ok(EnvFilter::new(if verbose { "debug" } else { "warn" })),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = build_env_filter(verbose)?;
    let _ = Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .try_init();
    Ok(())
}
