//! Logging setup.
//!
//! The terminal belongs to the questionnaire, so logs go to
//! `$XDG_STATE_HOME/cz-pane/cz-pane.log` (typically `~/.local/state/cz-pane/`).
//! `CZ_PANE_LOG_DIR` overrides the directory.

use anyhow::Result;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR_ENV: &str = "CZ_PANE_LOG_DIR";
const LOG_FILE: &str = "cz-pane.log";

/// Initialize logging to file.
///
/// Returns a guard that must be kept alive for the duration of the program
/// to ensure logs are flushed.
pub fn init() -> Result<WorkerGuard> {
    let log_dir = get_log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let log_file = log_dir.join(LOG_FILE);

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cz_pane=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()?;

    tracing::debug!("logging initialized to {:?}", log_file);

    Ok(guard)
}

fn get_log_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var(LOG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let state_dir = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("state")))
        .ok_or_else(|| anyhow::anyhow!("Could not determine state directory"))?;

    Ok(state_dir.join("cz-pane"))
}
