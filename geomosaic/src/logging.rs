//! Logging infrastructure for geomosaic.
//!
//! Provides structured logging with file output and console output:
//! - Writes to `logs/geomosaic.log` (cleared on session start)
//! - Also prints to stdout
//! - Configurable via RUST_LOG environment variable

use crate::config::LoggingSettings;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "geomosaic.log";

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] io::Error),

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging system.
///
/// Creates the log directory if needed, clears the previous log file,
/// and sets up output to both file and stdout.
///
/// # Errors
///
/// Returns an error if the log file cannot be prepared or another
/// subscriber has already been installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, LoggingError> {
    fs::create_dir_all(log_dir)?;

    // One log per session
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    // Defaults to INFO if RUST_LOG not set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Initialize logging from the `[logging]` section of a config file.
pub fn init_from_settings(settings: &LoggingSettings) -> Result<LoggingGuard, LoggingError> {
    init_logging(&settings.directory, &settings.file)
}
