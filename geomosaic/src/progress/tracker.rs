//! Operation progress state machine.

use super::sink::ProgressSink;
use super::types::{Completion, OperationId, ProgressSnapshot, ProgressStatus};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct TrackerState {
    operation_id: Option<OperationId>,
    status: ProgressStatus,
    completed: usize,
    total: usize,
    started_at: Option<Instant>,
    /// Set on completion so the final elapsed time stops growing
    finished_elapsed: Option<Duration>,
    error_message: Option<String>,
}

impl TrackerState {
    fn elapsed(&self) -> Duration {
        match (self.finished_elapsed, self.started_at) {
            (Some(frozen), _) => frozen,
            (None, Some(start)) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        let elapsed = self.elapsed().as_secs_f64();
        let eta_seconds = if self.status == ProgressStatus::Running && self.completed > 0 {
            let fraction = self.completed as f64 / self.total as f64;
            Some((elapsed / fraction - elapsed).max(0.0))
        } else {
            None
        };

        ProgressSnapshot {
            operation_id: self.operation_id.clone(),
            status: self.status,
            completed: self.completed,
            total: self.total,
            elapsed_seconds: elapsed,
            eta_seconds,
            error_message: self.error_message.clone(),
        }
    }
}

/// Thread-safe progress tracker for a single active operation.
///
/// The final state of an operation stays visible until the next
/// [`start`](Self::start) or [`reset`](Self::reset).
#[derive(Default)]
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    sinks: RwLock<Vec<Arc<dyn ProgressSink>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink notified on start, every update and completion.
    pub fn subscribe(&self, sink: Arc<dyn ProgressSink>) {
        self.sinks.write().push(sink);
    }

    /// Begins tracking `operation_id` with `total` units of work.
    pub fn start(&self, operation_id: OperationId, total: usize) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.status == ProgressStatus::Running {
                warn!(
                    previous = ?state.operation_id,
                    next = %operation_id,
                    "Starting a new operation while another is running"
                );
            }
            *state = TrackerState {
                operation_id: Some(operation_id),
                status: ProgressStatus::Running,
                completed: 0,
                total,
                started_at: Some(Instant::now()),
                finished_elapsed: None,
                error_message: None,
            };
            state.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Records `completed` finished units. Clamped to the total.
    ///
    /// Ignored unless an operation is running.
    pub fn update(&self, completed: usize) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.status != ProgressStatus::Running {
                debug!(status = %state.status, completed, "Ignoring progress update");
                return;
            }
            state.completed = completed.min(state.total);
            state.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Moves the running operation to a terminal state.
    pub fn complete(&self, completion: Completion) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.status != ProgressStatus::Running {
                debug!(status = %state.status, ?completion, "Ignoring completion");
                return;
            }
            state.finished_elapsed = Some(state.elapsed());
            state.status = completion.status();
            state.error_message = match completion {
                Completion::Failure(message) => Some(message),
                Completion::Success | Completion::Cancelled => None,
            };
            state.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Returns the tracker to Idle. Sinks are not notified.
    pub fn reset(&self) {
        *self.state.lock() = TrackerState::default();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().snapshot()
    }

    fn notify(&self, snapshot: &ProgressSnapshot) {
        let sinks = self.sinks.read().clone();
        for sink in sinks {
            sink.on_progress(snapshot);
        }
    }
}
