//! Final report of a download operation.

use super::error::DownloadError;
use crate::fetch::TileResult;
use crate::mosaic::MosaicSummary;
use crate::progress::{OperationId, ProgressStatus};
use std::path::Path;

/// Outcome of an operation that ran its tiles to a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub operation_id: OperationId,
    /// Completed, Failed or Cancelled
    pub status: ProgressStatus,
    pub tiles_total: usize,
    pub tiles_succeeded: usize,
    /// Per-tile results ordered by tile index
    pub results: Vec<TileResult>,
    /// Present when the mosaic was written
    pub mosaic: Option<MosaicSummary>,
    pub message: Option<String>,
}

impl DownloadReport {
    pub fn tiles_failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn mosaic_path(&self) -> Option<&Path> {
        self.mosaic.as_ref().map(|m| m.output_path.as_path())
    }

    pub fn is_success(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Converts a failed or cancelled report into the matching error.
    pub fn into_result(self) -> Result<DownloadReport, DownloadError> {
        match self.status {
            ProgressStatus::Completed => Ok(self),
            ProgressStatus::Cancelled => Err(DownloadError::Cancelled {
                completed: self.results.iter().filter(|r| !r.is_cancelled()).count(),
                total: self.tiles_total,
            }),
            _ => Err(DownloadError::IncompleteDownload {
                succeeded: self.tiles_succeeded,
                total: self.tiles_total,
            }),
        }
    }
}
