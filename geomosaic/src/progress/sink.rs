//! Progress observers.
//!
//! The tracker emits snapshots; sinks decide how to present them.
//!
//! ```ignore
//! use geomosaic::progress::{ProgressSnapshot, ProgressTracker};
//! use std::sync::Arc;
//!
//! let tracker = ProgressTracker::new();
//! tracker.subscribe(Arc::new(|s: &ProgressSnapshot| {
//!     println!("{}/{}", s.completed, s.total);
//! }));
//! ```

use super::types::{ProgressSnapshot, ProgressStatus};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Observer of progress snapshots.
///
/// Called synchronously from the thread that changed the tracker, so
/// implementations should return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Sink that logs snapshots using the `tracing` crate.
///
/// Lifecycle transitions are logged at info, individual updates at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let operation = snapshot
            .operation_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("-");

        match snapshot.status {
            ProgressStatus::Running if snapshot.completed == 0 => {
                info!(operation, total = snapshot.total, "Download started");
            }
            ProgressStatus::Running => {
                debug!(
                    operation,
                    completed = snapshot.completed,
                    total = snapshot.total,
                    eta_secs = snapshot.eta_seconds.unwrap_or(0.0),
                    "Download progress"
                );
            }
            ProgressStatus::Completed => {
                info!(
                    operation,
                    tiles = snapshot.total,
                    elapsed_secs = snapshot.elapsed_seconds,
                    "Download completed"
                );
            }
            ProgressStatus::Failed => {
                warn!(
                    operation,
                    completed = snapshot.completed,
                    total = snapshot.total,
                    error = snapshot.error_message.as_deref().unwrap_or(""),
                    "Download failed"
                );
            }
            ProgressStatus::Cancelled => {
                info!(
                    operation,
                    completed = snapshot.completed,
                    total = snapshot.total,
                    "Download cancelled"
                );
            }
            ProgressStatus::Idle => {}
        }
    }
}

/// Sink publishing the latest snapshot on a `tokio::sync::watch` channel.
///
/// Suited to UIs that poll or await changes rather than receive callbacks.
#[derive(Debug)]
pub struct WatchProgressSink {
    sender: watch::Sender<ProgressSnapshot>,
}

impl WatchProgressSink {
    pub fn new() -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (sender, receiver) = watch::channel(ProgressSnapshot::default());
        (Self { sender }, receiver)
    }

    /// Creates an additional receiver.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }
}

impl ProgressSink for WatchProgressSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        // Keeps the value even with no receivers alive
        self.sender.send_replace(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Completion, OperationId, ProgressTracker};
    use std::sync::Arc;

    #[test]
    fn test_watch_sink_tracks_latest() {
        let tracker = ProgressTracker::new();
        let (sink, receiver) = WatchProgressSink::new();
        tracker.subscribe(Arc::new(sink));

        tracker.start(OperationId::new("op"), 3);
        tracker.update(2);
        assert_eq!(receiver.borrow().completed, 2);
        assert_eq!(receiver.borrow().status, ProgressStatus::Running);

        tracker.complete(Completion::Success);
        assert_eq!(receiver.borrow().status, ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn test_watch_receiver_wakes_on_change() {
        let (sink, mut receiver) = WatchProgressSink::new();
        let snapshot = ProgressSnapshot {
            status: ProgressStatus::Running,
            total: 5,
            ..Default::default()
        };

        sink.on_progress(&snapshot);
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().total, 5);
    }

    #[test]
    fn test_logging_and_null_sinks_accept_all_states() {
        let statuses = [
            ProgressStatus::Idle,
            ProgressStatus::Running,
            ProgressStatus::Completed,
            ProgressStatus::Failed,
            ProgressStatus::Cancelled,
        ];
        for status in statuses {
            let snapshot = ProgressSnapshot {
                status,
                ..Default::default()
            };
            LoggingProgressSink.on_progress(&snapshot);
            NullProgressSink.on_progress(&snapshot);
        }
    }
}
