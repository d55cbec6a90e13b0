//! Progress value types.

use std::fmt;

/// Identifier of one download operation.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an ID of the form `dl-{utc timestamp}-{sequence}`.
    ///
    /// Unique as long as the caller never repeats `sequence`.
    pub fn generate(sequence: u64) -> Self {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        Self(format!("dl-{}-{:04}", stamp, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of the tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStatus {
    /// Nothing started yet, or tracker reset
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ProgressStatus {
    /// True for Completed, Failed and Cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Success,
    /// Failed with a human-readable reason
    Failure(String),
    Cancelled,
}

impl Completion {
    pub(crate) fn status(&self) -> ProgressStatus {
        match self {
            Self::Success => ProgressStatus::Completed,
            Self::Failure(_) => ProgressStatus::Failed,
            Self::Cancelled => ProgressStatus::Cancelled,
        }
    }
}

/// Point-in-time view of the tracked operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub operation_id: Option<OperationId>,
    pub status: ProgressStatus,
    pub completed: usize,
    pub total: usize,
    pub elapsed_seconds: f64,
    /// Estimated seconds remaining, known once at least one tile finished
    pub eta_seconds: Option<f64>,
    pub error_message: Option<String>,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Progress as a percentage (0-100).
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }
}
