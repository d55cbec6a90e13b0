use super::*;
use crate::fetch::{FetchError, FetchedTile, RetryPolicy, TileFetcher};
use crate::progress::{OperationId, ProgressSnapshot, ProgressStatus, ProgressTracker};
use crate::request::DownloadRequest;
use crate::tiler::{compute_tiles, Tile, TilingMethod};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Writes a fixed-size file per tile after `delay`, failing for `failing` indices.
struct FakeFetcher {
    failing: HashSet<usize>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeFetcher {
    fn new(failing: &[usize], delay: Duration) -> Self {
        Self {
            failing: failing.iter().copied().collect(),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl TileFetcher for FakeFetcher {
    async fn fetch(&self, tile: &Tile, _request: &DownloadRequest) -> Result<FetchedTile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&tile.index) {
            return Err(FetchError::EmptyBody {
                url: format!("tile {}", tile.index),
            });
        }
        std::fs::write(&tile.output_path, [1u8; 64]).unwrap();
        Ok(FetchedTile {
            path: tile.output_path.clone(),
            bytes: 64,
        })
    }
}

fn request(dir: &Path, area: (f64, f64, f64, f64), tile_size: f64) -> Arc<DownloadRequest> {
    Arc::new(
        DownloadRequest::builder()
            .area(area.0, area.1, area.2, area.3)
            .dates(
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            )
            .sensor("LANDSAT_8")
            .output_dir(dir)
            .tiling(TilingMethod::Degree { tile_size })
            .build_as_of(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap(),
    )
}

fn tiles_for(request: &DownloadRequest) -> Vec<Tile> {
    compute_tiles(
        request.area_of_interest(),
        request.tiling_method(),
        request.output_dir(),
    )
}

fn running_tracker(total: usize) -> Arc<ProgressTracker> {
    let tracker = Arc::new(ProgressTracker::new());
    tracker.start(OperationId::new("test"), total);
    tracker
}

#[tokio::test]
async fn test_partial_failure_is_recorded_not_propagated() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 5.0, 1.0), 1.0);
    let tiles = tiles_for(&request);
    assert_eq!(tiles.len(), 5);

    let fetcher = Arc::new(FakeFetcher::new(&[3], Duration::from_millis(1)));
    let scheduler = TileScheduler::new(Arc::clone(&fetcher), RetryPolicy::new(2, 10), 2);
    let tracker = running_tracker(5);

    let outcome = scheduler
        .run(tiles, request, Arc::clone(&tracker), CancellationToken::new())
        .await;

    assert!(!outcome.cancelled);
    assert_eq!(outcome.results.len(), 5);
    assert_eq!(outcome.succeeded(), 4);
    assert_eq!(outcome.failed(), 1);
    let failed = outcome.results.iter().find(|r| !r.success).unwrap();
    assert_eq!(failed.tile_index, 3);
    assert_eq!(failed.attempt, 2);
    // 4 tiles once, tile 3 twice
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 6);
    assert_eq!(tracker.snapshot().completed, 5);
}

#[tokio::test]
async fn test_successful_paths_follow_tile_order() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 2.0, 2.0), 1.0);
    let tiles = tiles_for(&request);
    let expected: Vec<_> = tiles.iter().map(|t| t.output_path.clone()).collect();

    let fetcher = Arc::new(FakeFetcher::new(&[], Duration::from_millis(1)));
    let outcome = TileScheduler::new(fetcher, RetryPolicy::new(1, 10), 4)
        .run(tiles, request, running_tracker(4), CancellationToken::new())
        .await;

    assert_eq!(outcome.successful_paths_in_tile_order(), expected);
    let indices: Vec<_> = outcome.sorted_results().iter().map(|r| r.tile_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 4.0, 3.0), 1.0);
    let tiles = tiles_for(&request);

    let fetcher = Arc::new(FakeFetcher::new(&[], Duration::from_millis(10)));
    let scheduler = TileScheduler::new(Arc::clone(&fetcher), RetryPolicy::new(1, 10), 3);
    let outcome = scheduler
        .run(tiles, request, running_tracker(12), CancellationToken::new())
        .await;

    assert_eq!(outcome.succeeded(), 12);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_cancel_mid_run_stops_dispatch() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 10.0, 1.0), 1.0);
    let tiles = tiles_for(&request);
    assert_eq!(tiles.len(), 10);

    let cancel = CancellationToken::new();
    let tracker = running_tracker(10);
    let trigger = cancel.clone();
    tracker.subscribe(Arc::new(move |s: &ProgressSnapshot| {
        if s.status == ProgressStatus::Running && s.completed >= 3 {
            trigger.cancel();
        }
    }));

    let fetcher = Arc::new(FakeFetcher::new(&[], Duration::from_millis(20)));
    let outcome = TileScheduler::new(fetcher, RetryPolicy::new(1, 10), 2)
        .run(tiles, request, Arc::clone(&tracker), cancel)
        .await;

    assert!(outcome.cancelled);
    assert!(
        (3..=5).contains(&outcome.results.len()),
        "got {} results",
        outcome.results.len()
    );
}

#[tokio::test]
async fn test_cancel_before_run_dispatches_nothing() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 2.0, 2.0), 1.0);
    let tiles = tiles_for(&request);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let fetcher = Arc::new(FakeFetcher::new(&[], Duration::from_millis(1)));
    let outcome = TileScheduler::new(Arc::clone(&fetcher), RetryPolicy::new(3, 10), 2)
        .run(tiles, request, running_tracker(4), cancel)
        .await;

    assert!(outcome.cancelled);
    assert!(outcome.results.is_empty());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_tile_list() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 1.0, 1.0), 1.0);
    let fetcher = Arc::new(FakeFetcher::new(&[], Duration::ZERO));

    let outcome = TileScheduler::new(fetcher, RetryPolicy::new(1, 10), 4)
        .run(Vec::new(), request, running_tracker(0), CancellationToken::new())
        .await;

    assert_eq!(outcome, ScheduleOutcome::default());
}

struct PanickingFetcher;

impl TileFetcher for PanickingFetcher {
    async fn fetch(&self, tile: &Tile, _request: &DownloadRequest) -> Result<FetchedTile, FetchError> {
        if tile.index == 0 {
            panic!("boom");
        }
        std::fs::write(&tile.output_path, [1u8; 64]).unwrap();
        Ok(FetchedTile {
            path: tile.output_path.clone(),
            bytes: 64,
        })
    }
}

#[tokio::test]
async fn test_worker_panic_is_contained() {
    let temp = TempDir::new().unwrap();
    let request = request(temp.path(), (0.0, 0.0, 3.0, 1.0), 1.0);
    let tiles = tiles_for(&request);

    let outcome = TileScheduler::new(Arc::new(PanickingFetcher), RetryPolicy::new(1, 10), 2)
        .run(tiles, request, running_tracker(3), CancellationToken::new())
        .await;

    assert_eq!(outcome.lost_workers, 1);
    // The surviving worker drains the queue
    assert_eq!(outcome.succeeded(), 2);
}

#[test]
fn test_from_config_uses_worker_count() {
    let config = crate::config::DownloadConfig::new().with_max_workers(7);
    let fetcher = Arc::new(FakeFetcher::new(&[], Duration::ZERO));
    let scheduler = TileScheduler::from_config(fetcher, &config);
    assert_eq!(scheduler.concurrency(), 7);
}
