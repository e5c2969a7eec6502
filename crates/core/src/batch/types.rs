//! Types for the batch runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::converter::{ConversionJob, ExitFailure, ProcessStatus};

/// Identifier of one batch run.
pub type BatchId = Uuid;

/// Errors that prevent a batch from entering `Running`.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A batch is already running on this runner.
    #[error("batch {batch_id} is already running")]
    AlreadyRunning { batch_id: BatchId },

    /// The worker pool would have no slots.
    #[error("worker pool has no available slots")]
    NoWorkers,
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Per-job failure, reported alongside the completion event.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// The engine could not be started or the input is unreadable.
    #[error("spawn failure: {reason}")]
    SpawnFailure { reason: String },

    /// The engine exited with a failure status.
    #[error("process failure: exit code {code:?}")]
    ProcessFailure { code: Option<i32> },
}

/// How a started job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed { error: JobError },
    /// Terminated because the batch was cancelled. Not an error.
    Cancelled,
}

impl JobOutcome {
    /// Maps a finished process status. A still-running process has not
    /// succeeded, so it maps to a failure without exit code.
    pub(crate) fn from_status(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::ExitedOk => Self::Succeeded,
            ProcessStatus::Running => {
                debug_assert!(false, "outcome requested for a running process");
                warn!("Outcome requested for a running process");
                Self::Failed {
                    error: JobError::ProcessFailure { code: None },
                }
            }
            ProcessStatus::ExitedError(ExitFailure::Spawn { reason }) => Self::Failed {
                error: JobError::SpawnFailure { reason },
            },
            ProcessStatus::ExitedError(ExitFailure::Status { code }) => Self::Failed {
                error: JobError::ProcessFailure { code },
            },
        }
    }

    /// Cancelled jobs do not advance `completed`.
    pub fn counts_toward_progress(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed {
                error: JobError::SpawnFailure { .. },
            } => "spawn_failure",
            Self::Failed {
                error: JobError::ProcessFailure { .. },
            } => "process_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Completed jobs against the batch total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Outcome counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Jobs still queued when the batch was cancelled.
    pub not_started: usize,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Events emitted to the registered listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        batch_id: BatchId,
        total: usize,
    },
    JobStarted {
        batch_id: BatchId,
        job: ConversionJob,
    },
    JobCompleted {
        batch_id: BatchId,
        job: ConversionJob,
        outcome: JobOutcome,
        progress: Progress,
    },
    BatchFinished {
        batch_id: BatchId,
        state: BatchState,
        summary: BatchSummary,
    },
}

/// Listener invoked from worker tasks. Thread affinity is the listener's concern.
pub type BatchEventCallback = Arc<dyn Fn(BatchEvent) + Send + Sync>;

/// Adapts a channel into a callback; events are dropped once the receiver is gone.
pub fn channel_callback(tx: mpsc::UnboundedSender<BatchEvent>) -> BatchEventCallback {
    Arc::new(move |event| {
        let _ = tx.send(event);
    })
}

/// A conversion currently holding a worker slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: Uuid,
    pub source: PathBuf,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// Snapshot of a runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: Option<BatchId>,
    pub state: BatchState,
    pub progress: Progress,
    pub worker_count: usize,
    pub active_jobs: Vec<ActiveJob>,
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(
            JobOutcome::from_status(ProcessStatus::ExitedOk),
            JobOutcome::Succeeded
        );
        assert_eq!(
            JobOutcome::from_status(ProcessStatus::ExitedError(ExitFailure::Status {
                code: Some(1)
            })),
            JobOutcome::Failed {
                error: JobError::ProcessFailure { code: Some(1) }
            }
        );
        let spawn = JobOutcome::from_status(ProcessStatus::ExitedError(ExitFailure::Spawn {
            reason: "missing".to_string(),
        }));
        assert_eq!(spawn.label(), "spawn_failure");
        assert!(spawn.counts_toward_progress());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_running_status_is_never_success() {
        assert_eq!(
            JobOutcome::from_status(ProcessStatus::Running),
            JobOutcome::Failed {
                error: JobError::ProcessFailure { code: None }
            }
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "running process")]
    fn test_running_status_is_never_success() {
        let _ = JobOutcome::from_status(ProcessStatus::Running);
    }

    #[test]
    fn test_cancelled_does_not_count() {
        assert!(!JobOutcome::Cancelled.counts_toward_progress());
        assert!(JobOutcome::Succeeded.counts_toward_progress());
    }

    #[test]
    fn test_state_terminal() {
        assert!(!BatchState::Idle.is_terminal());
        assert!(!BatchState::Running.is_terminal());
        assert!(BatchState::Completed.is_terminal());
        assert!(BatchState::Cancelled.is_terminal());
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = BatchEvent::BatchFinished {
            batch_id: Uuid::nil(),
            state: BatchState::Completed,
            summary: BatchSummary {
                total: 2,
                succeeded: 2,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "batch_finished");
        assert_eq!(json["state"], "completed");
        assert_eq!(json["summary"]["succeeded"], 2);
    }

    #[test]
    fn test_error_display() {
        let err = JobError::ProcessFailure { code: Some(2) };
        assert_eq!(err.to_string(), "process failure: exit code Some(2)");
        assert_eq!(
            BatchError::NoWorkers.to_string(),
            "worker pool has no available slots"
        );
    }

    #[tokio::test]
    async fn test_channel_callback_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = channel_callback(tx);
        callback(BatchEvent::Started {
            batch_id: Uuid::nil(),
            total: 5,
        });
        assert!(matches!(
            rx.recv().await,
            Some(BatchEvent::Started { total: 5, .. })
        ));
        drop(rx);
        // Receiver gone: must not panic.
        callback(BatchEvent::Started {
            batch_id: Uuid::nil(),
            total: 1,
        });
    }
}
