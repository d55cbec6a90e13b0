//! Download manager errors.

use crate::mosaic::MergeError;
use crate::progress::OperationId;
use crate::request::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by [`DownloadManager`](super::DownloadManager).
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request was rejected before any work started
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Another operation is still running
    #[error("operation {0} is still running")]
    Busy(OperationId),

    #[error("unknown operation {0}")]
    UnknownOperation(OperationId),

    /// The output directory could not be prepared
    #[error("cannot create output directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{succeeded} of {total} tiles downloaded; {} failed", .total - .succeeded)]
    IncompleteDownload { succeeded: usize, total: usize },

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("cancelled after {completed} of {total} tiles")]
    Cancelled { completed: usize, total: usize },

    /// A background task died unexpectedly
    #[error("internal error: {0}")]
    Internal(String),
}
