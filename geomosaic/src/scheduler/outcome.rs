//! Scheduler run results.

use crate::fetch::TileResult;
use std::path::PathBuf;

/// Everything a scheduler run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Per-tile results in completion order
    pub results: Vec<TileResult>,
    /// True if the run stopped because of cancellation
    pub cancelled: bool,
    /// Workers that panicked; their in-flight tile has no result
    pub lost_workers: usize,
}

impl ScheduleOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Paths of successful tiles ordered by tile index.
    pub fn successful_paths_in_tile_order(&self) -> Vec<PathBuf> {
        let mut ok: Vec<&TileResult> = self.results.iter().filter(|r| r.success).collect();
        ok.sort_by_key(|r| r.tile_index);
        ok.into_iter()
            .filter_map(|r| r.output_path.clone())
            .collect()
    }

    /// Results ordered by tile index.
    pub fn sorted_results(&self) -> Vec<TileResult> {
        let mut results = self.results.clone();
        results.sort_by_key(|r| r.tile_index);
        results
    }
}
