//! Worker pool.

use super::outcome::ScheduleOutcome;
use crate::config::DownloadConfig;
use crate::fetch::{RetryPolicy, TileFetcher, TileResult};
use crate::progress::ProgressTracker;
use crate::request::DownloadRequest;
use crate::tiler::Tile;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs tile fetches with bounded concurrency.
pub struct TileScheduler<F> {
    fetcher: Arc<F>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl<F: TileFetcher + 'static> TileScheduler<F> {
    /// Creates a scheduler running at most `concurrency` fetches at once.
    pub fn new(fetcher: Arc<F>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            fetcher,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(fetcher: Arc<F>, config: &DownloadConfig) -> Self {
        Self::new(fetcher, RetryPolicy::from(config), config.max_workers())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Fetches every tile, reporting each completion to `tracker`.
    ///
    /// Individual tile failures are recorded, never propagated. Returns once
    /// all workers have exited.
    pub async fn run(
        &self,
        tiles: Vec<Tile>,
        request: Arc<DownloadRequest>,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> ScheduleOutcome {
        let total = tiles.len();
        let workers = self.concurrency.min(total);
        let queue = Arc::new(Mutex::new(VecDeque::from(tiles)));
        let results: Arc<Mutex<Vec<TileResult>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));

        info!(tiles = total, workers = workers, "Scheduling tiles");

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let fetcher = Arc::clone(&self.fetcher);
            let policy = self.policy;
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let request = Arc::clone(&request);
            let tracker = Arc::clone(&tracker);
            let cancel = cancel.clone();

            set.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!(worker = worker_id, "Worker stopping, cancelled");
                        break;
                    }
                    let Some(tile) = queue.lock().pop_front() else {
                        break;
                    };

                    let result = policy
                        .fetch_with_retry(fetcher.as_ref(), &tile, &request, &cancel)
                        .await;

                    let mut done = results.lock();
                    done.push(result);
                    tracker.update(done.len());
                }
            });
        }

        let mut lost_workers = 0;
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Tile worker panicked");
                lost_workers += 1;
            }
        }

        let results = std::mem::take(&mut *results.lock());
        // A cancel that lands after the last tile finished changes nothing
        let cancelled = cancel.is_cancelled()
            && (results.len() < total || results.iter().any(TileResult::is_cancelled));
        let outcome = ScheduleOutcome {
            cancelled,
            results,
            lost_workers,
        };

        info!(
            tiles = total,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            cancelled = outcome.cancelled,
            "Scheduling finished"
        );
        outcome
    }
}
