//! Batch runner: owns one batch at a time and its cancellation.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::converter::{ConversionJob, Transcoder};

use super::config::BatchConfig;
use super::context::BatchContext;
use super::pool::WorkerPool;
use super::types::{
    BatchError, BatchEvent, BatchEventCallback, BatchId, BatchState, BatchStatus, BatchSummary,
    Progress,
};

/// Runs batches of conversion jobs across a bounded worker pool.
///
/// States move `Idle -> Running -> {Completed, Cancelled}`. A runner can start
/// a new batch once the previous one is terminal; every batch gets its own
/// cancellation flag and progress tracker.
pub struct BatchRunner {
    config: BatchConfig,
    transcoder: Arc<dyn Transcoder>,
    callback: Option<BatchEventCallback>,
    batch: RwLock<Option<Arc<BatchContext>>>,
    // Serializes start/cancel/wait against the pool.
    pool: Mutex<Option<WorkerPool>>,
}

impl BatchRunner {
    /// Create a new runner.
    pub fn new(config: BatchConfig, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            config,
            transcoder,
            callback: None,
            batch: RwLock::new(None),
            pool: Mutex::new(None),
        }
    }

    /// Registers the listener for batch events.
    pub fn with_callback(mut self, callback: BatchEventCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count()
    }

    /// Starts a batch and returns without waiting for any job.
    ///
    /// Fails if a batch is already running or the pool would have no slots;
    /// in both cases no state changes.
    pub async fn start(&self, jobs: Vec<ConversionJob>) -> Result<BatchId, BatchError> {
        let mut pool_slot = self.pool.lock().await;

        if let Some(current) = self.batch.read().await.as_ref() {
            if current.state() == BatchState::Running {
                warn!(batch_id = %current.id, "Batch already running");
                return Err(BatchError::AlreadyRunning {
                    batch_id: current.id,
                });
            }
        }

        // Previous batch is terminal; make sure its tasks are gone.
        if let Some(mut previous) = pool_slot.take() {
            previous.join().await;
        }

        let total = jobs.len();
        let ctx = Arc::new(BatchContext::new(
            self.config.clone(),
            Arc::clone(&self.transcoder),
            self.callback.clone(),
            total,
        ));

        let pool = if total > 0 {
            Some(WorkerPool::spawn(self.worker_count(), Arc::clone(&ctx))?)
        } else {
            None
        };

        *self.batch.write().await = Some(Arc::clone(&ctx));

        info!(
            batch_id = %ctx.id,
            total,
            workers = pool.as_ref().map_or(0, WorkerPool::size),
            transcoder = self.transcoder.name(),
            "Starting batch"
        );
        ctx.emit(BatchEvent::Started {
            batch_id: ctx.id,
            total,
        });

        match pool {
            Some(mut pool) => {
                pool.submit(jobs);
                pool.seal();
                *pool_slot = Some(pool);
            }
            None => {
                ctx.finish(BatchState::Completed);
            }
        }

        Ok(ctx.id)
    }

    /// Cancels the running batch and returns once every process it started
    /// has been terminated and reaped.
    ///
    /// Calling it again, or on a batch that already finished, has no effect
    /// and returns the current state.
    pub async fn cancel(&self) -> BatchState {
        let mut pool_slot = self.pool.lock().await;

        let Some(ctx) = self.current().await else {
            return BatchState::Idle;
        };
        if ctx.state() != BatchState::Running {
            return ctx.state();
        }

        if ctx.cancel.cancel() {
            info!(batch_id = %ctx.id, progress = ?ctx.tracker.progress(), "Cancelling batch");
        }

        if let Some(pool) = pool_slot.as_mut() {
            pool.shutdown(self.config.cancel_grace()).await;
        }

        // A worker may have completed the batch before seeing the flag.
        ctx.finish(BatchState::Cancelled);
        ctx.state()
    }

    /// Waits until the current batch is terminal and all its tasks have exited.
    pub async fn wait(&self) -> BatchState {
        let Some(ctx) = self.current().await else {
            return BatchState::Idle;
        };

        let mut rx = ctx.subscribe();
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => ctx.state(),
        };

        if let Some(pool) = self.pool.lock().await.as_mut() {
            pool.join().await;
        }
        state
    }

    /// Current state; `Idle` before the first batch.
    pub async fn state(&self) -> BatchState {
        match self.current().await {
            Some(ctx) => ctx.state(),
            None => BatchState::Idle,
        }
    }

    /// Snapshot of the current batch.
    pub async fn status(&self) -> BatchStatus {
        match self.current().await {
            Some(ctx) => BatchStatus {
                batch_id: Some(ctx.id),
                state: ctx.state(),
                progress: ctx.tracker.progress(),
                worker_count: self.worker_count(),
                active_jobs: ctx.active_jobs().await,
                summary: ctx.summary(),
            },
            None => BatchStatus {
                batch_id: None,
                state: BatchState::Idle,
                progress: Progress {
                    completed: 0,
                    total: 0,
                },
                worker_count: self.worker_count(),
                active_jobs: Vec::new(),
                summary: BatchSummary::default(),
            },
        }
    }

    async fn current(&self) -> Option<Arc<BatchContext>> {
        self.batch.read().await.clone()
    }
}
