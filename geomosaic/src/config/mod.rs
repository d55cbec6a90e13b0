//! Configuration types for geomosaic components.
//!
//! [`DownloadConfig`] carries the tuning knobs of the acquisition pipeline
//! (worker count, retry budget, timeouts). [`ConfigFile`] overlays values
//! from an INI file on top of the defaults.
//!
//! # Example
//!
//! ```
//! use geomosaic::config::DownloadConfig;
//! use std::time::Duration;
//!
//! let config = DownloadConfig::new()
//!     .with_max_workers(8)
//!     .with_request_timeout(Duration::from_secs(60));
//! assert_eq!(config.max_workers(), 8);
//! ```

mod download;
mod file;

pub use download::{
    DownloadConfig, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_WORKERS, DEFAULT_MIN_TILE_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_WORKERS_LIMIT,
};
pub use file::{ConfigFile, ConfigFileError, LoggingSettings, ProviderSettings};
