//! The download pipeline.

use super::error::DownloadError;
use super::report::DownloadReport;
use crate::config::DownloadConfig;
use crate::fetch::TileFetcher;
use crate::mosaic::{MosaicMerger, MosaicSummary, RasterCodec};
use crate::progress::{Completion, OperationId, ProgressSnapshot, ProgressStatus, ProgressTracker};
use crate::request::{DownloadRequest, ValidationError};
use crate::scheduler::{ScheduleOutcome, TileScheduler};
use crate::tiler::{compute_tiles, Tile};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct ActiveOperation {
    id: OperationId,
    cancel: CancellationToken,
    /// Set when the pipeline task exits, including by panic
    finished: Arc<AtomicBool>,
    /// Taken by the first `wait`
    handle: Option<JoinHandle<Result<DownloadReport, DownloadError>>>,
}

impl ActiveOperation {
    fn is_running(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }
}

/// Marks the owning operation finished when dropped.
struct FinishedOnDrop(Arc<AtomicBool>);

impl Drop for FinishedOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Orchestrates tiling, fetching, progress and merging.
///
/// # Example
///
/// ```ignore
/// let fetcher = Arc::new(ProviderTileFetcher::new(provider, http, config.request_timeout()));
/// let manager = DownloadManager::new(fetcher, GeoTiffCodec::new(), config);
/// manager.tracker().subscribe(Arc::new(LoggingProgressSink));
///
/// let report = manager.run(request).await?;
/// println!("mosaic at {:?}", report.mosaic_path());
/// ```
pub struct DownloadManager<F, C> {
    fetcher: Arc<F>,
    merger: Arc<MosaicMerger<C>>,
    config: DownloadConfig,
    tracker: Arc<ProgressTracker>,
    active: Mutex<Option<ActiveOperation>>,
    next_sequence: AtomicU64,
}

impl<F, C> DownloadManager<F, C>
where
    F: TileFetcher + 'static,
    C: RasterCodec,
{
    pub fn new(fetcher: Arc<F>, codec: C, config: DownloadConfig) -> Self {
        Self::with_tracker(fetcher, codec, config, Arc::new(ProgressTracker::new()))
    }

    /// Uses an existing tracker, e.g. one shared with a UI.
    pub fn with_tracker(
        fetcher: Arc<F>,
        codec: C,
        config: DownloadConfig,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            fetcher,
            merger: Arc::new(MosaicMerger::new(codec)),
            config,
            tracker,
            active: Mutex::new(None),
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Validates `request` and starts it in the background.
    ///
    /// Must be called from within a tokio runtime. Progress sinks are
    /// notified of the start before this returns.
    pub fn submit(&self, request: DownloadRequest) -> Result<OperationId, DownloadError> {
        request.validate(Utc::now().date_naive())?;
        if !self.fetcher.supports_sensor(request.sensor()) {
            return Err(ValidationError::UnknownSensor(request.sensor().to_string()).into());
        }

        let mut active = self.active.lock();
        if let Some(op) = active.as_ref().filter(|op| op.is_running()) {
            return Err(DownloadError::Busy(op.id.clone()));
        }

        let tiles = compute_tiles(
            request.area_of_interest(),
            request.tiling_method(),
            request.output_dir(),
        );
        let id = OperationId::generate(self.next_sequence.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();

        info!(
            operation = %id,
            sensor = request.sensor(),
            area = %request.area_of_interest(),
            tiling = %request.tiling_method(),
            tiles = tiles.len(),
            output = %request.output_dir().display(),
            "Download submitted"
        );

        self.tracker.start(id.clone(), tiles.len());

        let pipeline = Pipeline {
            id: id.clone(),
            request: Arc::new(request),
            scheduler: TileScheduler::from_config(Arc::clone(&self.fetcher), &self.config),
            merger: Arc::clone(&self.merger),
            tracker: Arc::clone(&self.tracker),
            cancel: cancel.clone(),
        };
        let finished = Arc::new(AtomicBool::new(false));
        let guard = FinishedOnDrop(Arc::clone(&finished));
        let handle = tokio::spawn(async move {
            let _guard = guard;
            pipeline.execute(tiles).await
        });

        *active = Some(ActiveOperation {
            id: id.clone(),
            cancel,
            finished,
            handle: Some(handle),
        });
        Ok(id)
    }

    /// Requests cancellation. In-flight tile attempts finish; no new tiles start.
    ///
    /// A request that arrives after the last tile finished still skips the
    /// merge. Once the merge has started it runs to completion, and
    /// cancelling a finished operation has no effect.
    pub fn cancel(&self, id: &OperationId) -> Result<(), DownloadError> {
        match self.active.lock().as_ref() {
            Some(op) if &op.id == id => {
                info!(operation = %id, "Cancellation requested");
                op.cancel.cancel();
                Ok(())
            }
            _ => Err(DownloadError::UnknownOperation(id.clone())),
        }
    }

    /// Progress of operation `id`.
    ///
    /// Only the most recent operation is tracked; older ids are unknown.
    pub fn status(&self, id: &OperationId) -> Result<ProgressSnapshot, DownloadError> {
        let snapshot = self.tracker.snapshot();
        if snapshot.operation_id.as_ref() == Some(id) {
            Ok(snapshot)
        } else {
            Err(DownloadError::UnknownOperation(id.clone()))
        }
    }

    /// Current tracker state, whatever operation it belongs to.
    pub fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// Waits for operation `id` to finish and returns its report.
    ///
    /// An operation can be waited on once.
    pub async fn wait(&self, id: &OperationId) -> Result<DownloadReport, DownloadError> {
        let handle = {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(op) if &op.id == id => op.handle.take(),
                _ => None,
            }
        }
        .ok_or_else(|| DownloadError::UnknownOperation(id.clone()))?;

        let result = handle.await.map_err(|e| {
            error!(operation = %id, error = %e, "Download task failed");
            DownloadError::Internal(e.to_string())
        });

        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|op| &op.id == id) {
            *active = None;
        }
        result?
    }

    /// Submits `request` and waits for it.
    ///
    /// Failed and cancelled operations are returned as errors.
    pub async fn run(&self, request: DownloadRequest) -> Result<DownloadReport, DownloadError> {
        let id = self.submit(request)?;
        self.wait(&id).await?.into_result()
    }
}

/// Everything the background task owns.
struct Pipeline<F, C> {
    id: OperationId,
    request: Arc<DownloadRequest>,
    scheduler: TileScheduler<F>,
    merger: Arc<MosaicMerger<C>>,
    tracker: Arc<ProgressTracker>,
    cancel: CancellationToken,
}

impl<F, C> Pipeline<F, C>
where
    F: TileFetcher + 'static,
    C: RasterCodec,
{
    async fn execute(self, tiles: Vec<Tile>) -> Result<DownloadReport, DownloadError> {
        let total = tiles.len();
        let output_dir = self.request.output_dir().to_path_buf();

        if let Err(source) = tokio::fs::create_dir_all(&output_dir).await {
            let err = DownloadError::Setup {
                path: output_dir,
                source,
            };
            self.tracker.complete(Completion::Failure(err.to_string()));
            return Err(err);
        }

        let outcome = self
            .scheduler
            .run(
                tiles,
                Arc::clone(&self.request),
                Arc::clone(&self.tracker),
                self.cancel.clone(),
            )
            .await;
        let succeeded = outcome.succeeded();

        if outcome.cancelled || self.cancel.is_cancelled() {
            self.tracker.complete(Completion::Cancelled);
            return Ok(self.report(ProgressStatus::Cancelled, total, &outcome, None, None));
        }

        if succeeded < total {
            let message = DownloadError::IncompleteDownload { succeeded, total }.to_string();
            warn!(operation = %self.id, "{}", message);
            self.tracker.complete(Completion::Failure(message.clone()));
            return Ok(self.report(ProgressStatus::Failed, total, &outcome, None, Some(message)));
        }

        let paths = outcome.successful_paths_in_tile_order();
        let mosaic_path = self.request.mosaic_path();
        let merger = Arc::clone(&self.merger);
        let merged = tokio::task::spawn_blocking(move || merger.merge(&paths, &mosaic_path)).await;

        match merged {
            Ok(Ok(summary)) => {
                self.tracker.complete(Completion::Success);
                Ok(self.report(ProgressStatus::Completed, total, &outcome, Some(summary), None))
            }
            Ok(Err(e)) => {
                error!(operation = %self.id, error = %e, "Merge failed");
                let err = DownloadError::Merge(e);
                self.tracker.complete(Completion::Failure(err.to_string()));
                Err(err)
            }
            Err(e) => {
                error!(operation = %self.id, error = %e, "Merge task failed");
                let err = DownloadError::Internal(e.to_string());
                self.tracker.complete(Completion::Failure(err.to_string()));
                Err(err)
            }
        }
    }

    fn report(
        &self,
        status: ProgressStatus,
        total: usize,
        outcome: &ScheduleOutcome,
        mosaic: Option<MosaicSummary>,
        message: Option<String>,
    ) -> DownloadReport {
        DownloadReport {
            operation_id: self.id.clone(),
            status,
            tiles_total: total,
            tiles_succeeded: outcome.succeeded(),
            results: outcome.sorted_results(),
            mosaic,
            message,
        }
    }
}
