//! Progress tracking for download operations.
//!
//! A [`ProgressTracker`] owns the state of one operation at a time. The
//! scheduler reports completions, the download manager reports the outcome,
//! and any number of [`ProgressSink`]s observe the resulting snapshots.
//!
//! ```text
//! DownloadManager        ProgressTracker              Sinks
//!      │ start(id, N)          │                        │
//!      ├──────────────────────►│ Running 0/N ──────────►│
//! TileScheduler                │                        │
//!      │ update(k)             │                        │
//!      ├──────────────────────►│ Running k/N, ETA ─────►│
//! DownloadManager              │                        │
//!      │ complete(outcome)     │                        │
//!      ├──────────────────────►│ Completed/Failed ─────►│
//! ```
//!
//! Sinks are called after the tracker's lock is released, so a sink may
//! call [`ProgressTracker::snapshot`] without deadlocking.

mod sink;
mod tracker;
mod types;

pub use sink::{LoggingProgressSink, NullProgressSink, ProgressSink, WatchProgressSink};
pub use tracker::ProgressTracker;
pub use types::{Completion, OperationId, ProgressSnapshot, ProgressStatus};
