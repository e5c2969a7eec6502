//! State shared by the control side and the workers of one batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::converter::{ConversionJob, ProcessHandle, Transcoder};
use crate::metrics;

use super::cancel::CancellationFlag;
use super::config::BatchConfig;
use super::tracker::ProgressTracker;
use super::types::{
    ActiveJob, BatchEvent, BatchEventCallback, BatchId, BatchState, BatchSummary, JobOutcome,
    Progress,
};

#[derive(Debug, Default)]
struct OutcomeCounters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Everything a worker needs; one instance per batch.
pub(crate) struct BatchContext {
    pub(crate) id: BatchId,
    pub(crate) config: BatchConfig,
    pub(crate) transcoder: Arc<dyn Transcoder>,
    pub(crate) cancel: CancellationFlag,
    pub(crate) tracker: ProgressTracker,
    state: watch::Sender<BatchState>,
    counters: OutcomeCounters,
    active: RwLock<HashMap<Uuid, ActiveJob>>,
    report_lock: Mutex<()>,
    callback: Option<BatchEventCallback>,
}

impl BatchContext {
    pub(crate) fn new(
        config: BatchConfig,
        transcoder: Arc<dyn Transcoder>,
        callback: Option<BatchEventCallback>,
        total: usize,
    ) -> Self {
        let (state, _) = watch::channel(BatchState::Running);
        Self {
            id: Uuid::new_v4(),
            config,
            transcoder,
            cancel: CancellationFlag::new(),
            tracker: ProgressTracker::new(total),
            state,
            counters: OutcomeCounters::default(),
            active: RwLock::new(HashMap::new()),
            report_lock: Mutex::new(()),
            callback,
        }
    }

    pub(crate) fn emit(&self, event: BatchEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    pub(crate) fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.subscribe()
    }

    /// Moves `Running` to `target`. Only the first caller succeeds; that
    /// caller also emits `BatchFinished`.
    pub(crate) fn finish(&self, target: BatchState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == BatchState::Running {
                *state = target;
                true
            } else {
                false
            }
        });

        if changed {
            let summary = self.summary();
            info!(
                batch_id = %self.id,
                state = target.as_str(),
                succeeded = summary.succeeded,
                failed = summary.failed,
                cancelled = summary.cancelled,
                not_started = summary.not_started,
                "Batch finished"
            );
            metrics::BATCHES_TOTAL
                .with_label_values(&[target.as_str()])
                .inc();
            self.emit(BatchEvent::BatchFinished {
                batch_id: self.id,
                state: target,
                summary,
            });
        }
        changed
    }

    /// Records a finished job and emits `JobCompleted`.
    ///
    /// Reports are serialized so listeners see `completed` strictly increasing.
    pub(crate) fn report(&self, job: ConversionJob, outcome: JobOutcome) -> Progress {
        let _guard = self
            .report_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.record(&outcome);
        let progress = if outcome.counts_toward_progress() {
            self.tracker.increment().unwrap_or_else(|| {
                warn!(batch_id = %self.id, "Progress tracker already full");
                self.tracker.progress()
            })
        } else {
            self.tracker.progress()
        };

        self.emit(BatchEvent::JobCompleted {
            batch_id: self.id,
            job,
            outcome,
            progress,
        });
        progress
    }

    fn record(&self, outcome: &JobOutcome) {
        let counter = match outcome {
            JobOutcome::Succeeded => &self.counters.succeeded,
            JobOutcome::Failed { .. } => &self.counters.failed,
            JobOutcome::Cancelled => &self.counters.cancelled,
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn summary(&self) -> BatchSummary {
        let total = self.tracker.total();
        let succeeded = self.counters.succeeded.load(Ordering::Acquire);
        let failed = self.counters.failed.load(Ordering::Acquire);
        let cancelled = self.counters.cancelled.load(Ordering::Acquire);
        BatchSummary {
            total,
            succeeded,
            failed,
            cancelled,
            not_started: total.saturating_sub(succeeded + failed + cancelled),
        }
    }

    pub(crate) async fn register_active(&self, job: &ConversionJob, handle: &ProcessHandle) {
        self.active.write().await.insert(
            job.id,
            ActiveJob {
                job_id: job.id,
                source: job.source.clone(),
                pid: handle.pid(),
                started_at: handle.started_at(),
            },
        );
    }

    pub(crate) async fn unregister_active(&self, job_id: &Uuid) {
        self.active.write().await.remove(job_id);
    }

    pub(crate) async fn active_jobs(&self) -> Vec<ActiveJob> {
        let mut jobs: Vec<ActiveJob> = self.active.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTranscoder;

    fn context(total: usize, callback: Option<BatchEventCallback>) -> BatchContext {
        BatchContext::new(
            BatchConfig::default(),
            Arc::new(ScriptedTranscoder::new()),
            callback,
            total,
        )
    }

    #[test]
    fn test_finish_only_once() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let ctx = context(
            1,
            Some(Arc::new(move |e| sink.lock().unwrap().push(e))),
        );

        assert_eq!(ctx.state(), BatchState::Running);
        assert!(ctx.finish(BatchState::Completed));
        assert!(!ctx.finish(BatchState::Cancelled));
        assert_eq!(ctx.state(), BatchState::Completed);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            BatchEvent::BatchFinished {
                state: BatchState::Completed,
                ..
            }
        ));
    }

    fn job(name: &str) -> ConversionJob {
        ConversionJob::new(format!("/in/{}.wma", name), std::path::Path::new("/out"), "mp3")
    }

    #[test]
    fn test_report_advances_only_for_counted_outcomes() {
        let ctx = context(3, None);
        let p1 = ctx.report(job("a"), JobOutcome::Succeeded);
        assert_eq!(p1, Progress { completed: 1, total: 3 });
        let p2 = ctx.report(job("b"), JobOutcome::Cancelled);
        assert_eq!(p2, Progress { completed: 1, total: 3 });
        let p3 = ctx.report(
            job("c"),
            JobOutcome::Failed {
                error: crate::batch::JobError::ProcessFailure { code: Some(1) },
            },
        );
        assert_eq!(p3, Progress { completed: 2, total: 3 });
    }

    #[test]
    fn test_summary_counts_not_started() {
        let ctx = context(5, None);
        ctx.report(job("a"), JobOutcome::Succeeded);
        ctx.report(job("b"), JobOutcome::Cancelled);
        ctx.report(job("c"), JobOutcome::Cancelled);

        let summary = ctx.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.not_started, 2);
    }
}
