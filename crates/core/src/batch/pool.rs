//! Bounded worker pool.
//!
//! A dispatcher task takes jobs off an unbounded queue in FIFO order and
//! acquires a semaphore permit for each before spawning its worker, so at most
//! `size` conversion processes exist at once. Closing the semaphore stops the
//! dispatcher: whatever is still queued is never started.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::converter::{ConversionJob, ProcessHandle};
use crate::metrics;

use super::context::BatchContext;
use super::types::{BatchError, BatchEvent, BatchState, JobError, JobOutcome};

pub(crate) struct WorkerPool {
    size: usize,
    semaphore: Arc<Semaphore>,
    queue: Option<mpsc::UnboundedSender<ConversionJob>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts an idle pool with `size` slots for the batch in `ctx`.
    pub(crate) fn spawn(size: usize, ctx: Arc<BatchContext>) -> Result<Self, BatchError> {
        if size == 0 {
            return Err(BatchError::NoWorkers);
        }

        let semaphore = Arc::new(Semaphore::new(size));
        let (queue, rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(rx, Arc::clone(&semaphore), ctx));

        Ok(Self {
            size,
            semaphore,
            queue: Some(queue),
            dispatcher: Some(dispatcher),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Slots currently held by a running job.
    pub(crate) fn busy(&self) -> usize {
        self.size.saturating_sub(self.semaphore.available_permits())
    }

    /// Queues jobs and returns immediately. Returns how many were queued.
    pub(crate) fn submit(&self, jobs: Vec<ConversionJob>) -> usize {
        let Some(ref queue) = self.queue else {
            return 0;
        };
        let mut queued = 0;
        for job in jobs {
            if queue.send(job).is_err() {
                break;
            }
            queued += 1;
        }
        queued
    }

    /// No more jobs will be submitted; the dispatcher exits once the queue drains.
    pub(crate) fn seal(&mut self) {
        self.queue.take();
    }

    /// Stops dispatching and waits until every worker has returned.
    ///
    /// Warns once `grace` elapses but keeps waiting: children are always reaped.
    pub(crate) async fn shutdown(&mut self, grace: Duration) {
        self.semaphore.close();
        self.seal();

        let Some(mut dispatcher) = self.dispatcher.take() else {
            return;
        };

        match timeout(grace, &mut dispatcher).await {
            Ok(result) => log_join(result),
            Err(_) => {
                warn!(
                    busy = self.busy(),
                    "Workers still running after {:?}, waiting for processes to exit", grace
                );
                log_join(dispatcher.await);
            }
        }
    }

    /// Waits for the dispatcher and all workers to finish.
    pub(crate) async fn join(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            log_join(dispatcher.await);
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Worker pool task failed: {}", e);
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<ConversionJob>,
    semaphore: Arc<Semaphore>,
    ctx: Arc<BatchContext>,
) {
    let mut workers = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break, // closed by shutdown
        };
        if ctx.cancel.is_cancelled() {
            break;
        }

        let ctx = Arc::clone(&ctx);
        workers.spawn(async move {
            let _permit = permit;
            run_job(&ctx, job).await;
        });

        // Reap finished workers as we go.
        while let Some(result) = workers.try_join_next() {
            if let Err(e) = result {
                error!("Worker task failed: {}", e);
            }
        }
    }
    drop(rx);

    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            error!("Worker task failed: {}", e);
        }
    }
    debug!(batch_id = %ctx.id, "Dispatcher stopped");
}

/// Runs one job to completion or early termination and reports it.
async fn run_job(ctx: &BatchContext, job: ConversionJob) {
    // Dispatched just as the flag was set.
    if ctx.cancel.is_cancelled() {
        return;
    }

    let command = ctx.transcoder.command(&job);
    let mut handle = ProcessHandle::start(&command);
    let spawned = handle.spawn_error().is_none();
    ctx.register_active(&job, &handle).await;
    if spawned {
        metrics::PROCESSES_IN_FLIGHT.inc();
    }
    debug!(batch_id = %ctx.id, job_id = %job.id, pid = ?handle.pid(), source = %job.source.display(), "Job started");
    ctx.emit(BatchEvent::JobStarted {
        batch_id: ctx.id,
        job: job.clone(),
    });

    let poll_interval = ctx.config.poll_interval();
    let outcome = loop {
        let status = handle.poll();
        if !status.is_running() {
            debug!(job_id = %job.id, status = status.label(), "Process exited");
            break JobOutcome::from_status(status);
        }
        if ctx.cancel.is_cancelled() {
            handle.terminate();
            handle.wait().await;
            break JobOutcome::Cancelled;
        }
        sleep(poll_interval).await;
    };

    // No-op unless polling gave up on a child that is still unreaped.
    handle.wait().await;

    let elapsed = handle.elapsed();
    drop(handle);
    if spawned {
        metrics::PROCESSES_IN_FLIGHT.dec();
    }
    metrics::JOBS_TOTAL
        .with_label_values(&[outcome.label()])
        .inc();
    metrics::JOB_DURATION
        .with_label_values(&[outcome.label()])
        .observe(elapsed.as_secs_f64());

    if ctx.config.remove_partial_outputs && leaves_partial_output(&outcome) {
        remove_partial_output(&job).await;
    }

    ctx.unregister_active(&job.id).await;

    match &outcome {
        JobOutcome::Succeeded => info!(
            batch_id = %ctx.id,
            job_id = %job.id,
            "Converted {} in {:.1}s",
            job.display_name(),
            elapsed.as_secs_f64()
        ),
        JobOutcome::Failed { error } => {
            warn!(batch_id = %ctx.id, job_id = %job.id, "Conversion of {} failed: {}", job.display_name(), error)
        }
        JobOutcome::Cancelled => {
            info!(batch_id = %ctx.id, job_id = %job.id, "Conversion of {} cancelled", job.display_name())
        }
    }

    let counted = outcome.counts_toward_progress();
    let progress = ctx.report(job, outcome);

    if counted && progress.is_complete() && !ctx.cancel.is_cancelled() {
        ctx.finish(BatchState::Completed);
    }
}

fn leaves_partial_output(outcome: &JobOutcome) -> bool {
    matches!(
        outcome,
        JobOutcome::Cancelled
            | JobOutcome::Failed {
                error: JobError::ProcessFailure { .. }
            }
    )
}

async fn remove_partial_output(job: &ConversionJob) {
    match tokio::fs::remove_file(&job.destination).await {
        Ok(()) => debug!(job_id = %job.id, path = %job.destination.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            job_id = %job.id,
            "Failed to remove partial output {}: {}",
            job.destination.display(),
            e
        ),
    }
}
