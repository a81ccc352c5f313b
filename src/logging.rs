//! Tracing setup for the CLI and embedding applications.
//!
//! On Linux the systemd journal is preferred. Anywhere else, or when the
//! journal socket is missing, events go to `promptvault.log` rotated daily.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "PROMPTVAULT_LOG";
const LOG_FILE: &str = "promptvault.log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptvault")
        .join("logs")
}

/// Install the global subscriber.
///
/// `PROMPTVAULT_LOG` takes `EnvFilter` directives such as `debug` or
/// `promptvault::ocr=trace`; `info` applies when it is unset. Fails if a
/// subscriber is already installed.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(journald) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(filter())
                .with(journald)
                .try_init()?;
            tracing::info!(backend = "journald", "Logging ready");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE));
    // Buffered lines are flushed only while the guard is alive
    let _ = FILE_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;
    tracing::info!(backend = "file", dir = %log_dir.display(), "Logging ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir_is_namespaced() {
        assert!(default_log_dir().ends_with("promptvault/logs"));
    }
}
