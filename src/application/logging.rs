//! # Logging
//!
//! Process-wide tracing setup: a file layer in the data directory and an
//! optional console layer on stderr.

use anyhow::{Context, Result};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::config::AppConfig;

pub const LOG_FILE: &str = "session.log";

/// Installs the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes the file writer.
pub fn init(config: &AppConfig) -> Result<WorkerGuard> {
    let dir = config.data_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

    // Clear previous session log
    let log_path = dir.join(LOG_FILE);
    if log_path.exists() {
        let _ = fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.system.logging.filter))
        .context("Invalid log filter")?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let console_layer = config
        .system
        .logging
        .console
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Logging already initialised")?;

    Ok(guard)
}
