//! Retry policy and post-download validation.

use super::fetcher::TileFetcher;
use crate::config::DownloadConfig;
use crate::request::DownloadRequest;
use crate::tiler::Tile;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Message recorded for tiles abandoned because of cancellation.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Outcome of all attempts for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResult {
    pub tile_index: usize,
    pub success: bool,
    /// Set only on success
    pub output_path: Option<PathBuf>,
    /// "ok" on success, otherwise the last error
    pub message: String,
    /// Attempts made (1-based), 0 if cancelled before the first
    pub attempt: u32,
    pub bytes: u64,
}

impl TileResult {
    fn succeeded(tile_index: usize, path: PathBuf, attempt: u32, bytes: u64) -> Self {
        Self {
            tile_index,
            success: true,
            output_path: Some(path),
            message: "ok".to_string(),
            attempt,
            bytes,
        }
    }

    fn failed(tile_index: usize, message: impl Into<String>, attempt: u32) -> Self {
        Self {
            tile_index,
            success: false,
            output_path: None,
            message: message.into(),
            attempt,
            bytes: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.success && self.message == CANCELLED_MESSAGE
    }
}

/// Downloaded file failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileValidationError {
    #[error("tile file {0} does not exist")]
    Missing(PathBuf),

    #[error("tile file {path} is {size} bytes, expected more than {min}")]
    TooSmall { path: PathBuf, size: u64, min: u64 },

    #[error("cannot inspect tile file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Checks that `path` is a regular file larger than `min_bytes`.
///
/// Returns the file size.
pub fn validate_tile_file(path: &Path, min_bytes: u64) -> Result<u64, TileValidationError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TileValidationError::Missing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(TileValidationError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    if !metadata.is_file() {
        return Err(TileValidationError::Missing(path.to_path_buf()));
    }

    let size = metadata.len();
    if size <= min_bytes {
        return Err(TileValidationError::TooSmall {
            path: path.to_path_buf(),
            size,
            min: min_bytes,
        });
    }
    Ok(size)
}

/// Bounded retry with exponential backoff around a [`TileFetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_tile_bytes: u64,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_tile_bytes: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_tile_bytes,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    /// Sets the delay after the first failure and the ceiling it doubles up to.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn min_tile_bytes(&self) -> u64 {
        self.min_tile_bytes
    }

    /// Delay after failed attempt number `attempt`: `base * 2^(attempt-1)`, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << shift)
            .min(self.backoff_max)
    }

    /// Fetches `tile` until it validates, attempts run out, or `cancel` fires.
    ///
    /// Cancellation is checked before every attempt and interrupts backoff
    /// sleeps; an attempt already in flight runs to completion.
    pub async fn fetch_with_retry<F: TileFetcher>(
        &self,
        fetcher: &F,
        tile: &Tile,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> TileResult {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                debug!(tile = tile.index, attempt = attempt, "Tile cancelled before attempt");
                return TileResult::failed(tile.index, CANCELLED_MESSAGE, attempt - 1);
            }

            trace!(tile = tile.index, attempt = attempt, "Tile fetch attempt");

            match fetcher.fetch(tile, request).await {
                Ok(fetched) => match validate_tile_file(&fetched.path, self.min_tile_bytes) {
                    Ok(size) => {
                        debug!(
                            tile = tile.index,
                            attempt = attempt,
                            bytes = size,
                            "Tile fetched"
                        );
                        return TileResult::succeeded(tile.index, fetched.path, attempt, size);
                    }
                    Err(e) => {
                        warn!(
                            tile = tile.index,
                            attempt = attempt,
                            error = %e,
                            "Tile failed validation"
                        );
                        // Leave nothing behind that could be mistaken for a tile
                        let _ = std::fs::remove_file(&fetched.path);
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    warn!(
                        tile = tile.index,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Tile fetch failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < self.max_attempts {
                let backoff = self.backoff_delay(attempt);
                if !backoff.is_zero() {
                    trace!(backoff_ms = backoff.as_millis() as u64, "Backoff before retry");
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(tile = tile.index, attempt = attempt, "Tile cancelled during backoff");
                            return TileResult::failed(tile.index, CANCELLED_MESSAGE, attempt);
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        TileResult::failed(tile.index, last_error, self.max_attempts)
    }
}

impl From<&DownloadConfig> for RetryPolicy {
    fn from(config: &DownloadConfig) -> Self {
        RetryPolicy::new(config.max_attempts(), config.min_tile_bytes())
            .with_backoff(config.backoff_base(), config.backoff_max())
    }
}
