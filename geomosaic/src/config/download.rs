//! Download pipeline configuration.

use std::time::Duration;

/// Default number of concurrent tile workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Upper bound accepted for the worker count.
pub const MAX_WORKERS_LIMIT: usize = 64;

/// Default number of attempts per tile, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default deadline for one fetch attempt.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// A downloaded tile must be strictly larger than this to count as valid.
pub const DEFAULT_MIN_TILE_BYTES: u64 = 1024;

/// Default delay before the second attempt.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Default ceiling for the retry delay.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 8_000;

/// Configuration for tile acquisition.
///
/// # Example
///
/// ```
/// use geomosaic::config::DownloadConfig;
///
/// let config = DownloadConfig::default();
/// assert_eq!(config.max_workers(), 4);
/// assert_eq!(config.max_attempts(), 3);
///
/// let config = DownloadConfig::new()
///     .with_max_workers(2)
///     .with_max_attempts(5)
///     .with_min_tile_bytes(0);
/// assert_eq!(config.max_attempts(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Number of tiles fetched concurrently
    max_workers: usize,
    /// Attempts per tile before it is reported as failed
    max_attempts: u32,
    /// Deadline for a single fetch attempt
    request_timeout: Duration,
    /// Size threshold for a valid tile file
    min_tile_bytes: u64,
    /// First backoff delay, doubled after every failed attempt
    backoff_base: Duration,
    /// Backoff ceiling
    backoff_max: Duration,
}

impl DownloadConfig {
    /// Create a new download configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of concurrent workers.
    ///
    /// Values are clamped to `1..=MAX_WORKERS_LIMIT`.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.clamp(1, MAX_WORKERS_LIMIT);
        self
    }

    /// Set the number of attempts per tile. Zero is treated as one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_min_tile_bytes(mut self, bytes: u64) -> Self {
        self.min_tile_bytes = bytes;
        self
    }

    /// Set the backoff base delay. A zero base disables waiting between attempts.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn min_tile_bytes(&self) -> u64 {
        self.min_tile_bytes
    }

    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            min_tile_bytes: DEFAULT_MIN_TILE_BYTES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
        }
    }
}
