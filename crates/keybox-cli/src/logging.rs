//! Logging initialization.
//!
//! Sinks are layered onto one registry in a fixed order: console, per-boot
//! file, front-panel display, backend error forwarding. The display and
//! backend sinks hand back handles the supervisor consumes.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local};
use keybox_core::constants::{DISPLAY_LOG_LINES, ERROR_LOG_QUEUE_CAPACITY, MIN_PLAUSIBLE_YEAR};
use keybox_engine::config::LoggingConfig;
use keybox_engine::{DisplayLog, ErrorQueue, display_log, error_forwarding};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name used when the wall clock is obviously unset.
pub const UNKNOWN_TIME_LOG: &str = "unknown_time.log";

/// Handles to the sinks the supervisor drives.
pub struct LogSinks {
    pub display: DisplayLog,
    pub errors: ErrorQueue,
}

/// Initialize the global subscriber.
///
/// `level` overrides `config.level` when given; `RUST_LOG` overrides both.
pub fn init_logging(config: &LoggingConfig, level: Option<&str>) -> Result<LogSinks> {
    let directive = level.unwrap_or(&config.level);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    let (file, file_error) = match open_log_file(&config.directory, Local::now(), config.max_files)
    {
        Ok((file, _)) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_target(false)
            .with_ansi(false)
    });

    let (display_layer, display) = display_log(DISPLAY_LOG_LINES);
    let (error_layer, errors) = error_forwarding(ERROR_LOG_QUEUE_CAPACITY);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .with(display_layer)
        .with(error_layer)
        .try_init()
        .context("a global subscriber is already installed")?;

    match file_error {
        None => info!("Logging to local file started"),
        Some(e) => info!(
            directory = %config.directory.display(),
            "Log directory not writable, logging to console only: {e}"
        ),
    }

    Ok(LogSinks { display, errors })
}

/// Name of the log file for a boot at `now`.
pub fn log_file_name(now: DateTime<Local>) -> String {
    if now.year() < MIN_PLAUSIBLE_YEAR {
        UNKNOWN_TIME_LOG.to_string()
    } else {
        format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S"))
    }
}

/// Delete the oldest `.log` files until at most `keep` remain.
///
/// File names are timestamps, so name order is age order. Returns the
/// number of files deleted.
pub fn prune_logs(directory: &Path, keep: usize) -> io::Result<usize> {
    let mut logs: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .collect();
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    for path in &logs[..excess] {
        fs::remove_file(path)?;
    }
    Ok(excess)
}

/// Create the log directory if needed, prune old files and open this boot's
/// file for appending.
pub fn open_log_file(
    directory: &Path,
    now: DateTime<Local>,
    max_files: usize,
) -> io::Result<(File, PathBuf)> {
    fs::create_dir_all(directory)?;
    prune_logs(directory, max_files.saturating_sub(1))?;

    let path = directory.join(log_file_name(now));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}
