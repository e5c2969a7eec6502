//! Cancellation integration tests.
//!
//! Every scenario checks the same guarantee from a different angle: once
//! `cancel()` returns, no process started by the batch is still alive and no
//! queued job will ever start.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use batchconv_core::{
    batch::{BatchConfig, BatchEvent, BatchRunner, BatchState, JobOutcome},
    converter::ConversionJob,
    testing::ScriptedTranscoder,
};

/// Long enough that only cancellation can end it.
const HANG: &str = "exec sleep 30";

struct CancelHarness {
    runner: Arc<BatchRunner>,
    transcoder: ScriptedTranscoder,
    events: Arc<Mutex<Vec<BatchEvent>>>,
    output_dir: TempDir,
}

impl CancelHarness {
    fn new(transcoder: ScriptedTranscoder, workers: usize, remove_partial_outputs: bool) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut config = BatchConfig::default()
            .with_max_workers(workers)
            .with_poll_interval(Duration::from_millis(20));
        config.remove_partial_outputs = remove_partial_outputs;

        let runner = BatchRunner::new(config, Arc::new(transcoder.clone()))
            .with_callback(Arc::new(move |e| sink.lock().unwrap().push(e)));

        Self {
            runner: Arc::new(runner),
            transcoder,
            events,
            output_dir: TempDir::new().expect("Failed to create output dir"),
        }
    }

    fn jobs(&self, count: usize) -> Vec<ConversionJob> {
        (0..count)
            .map(|i| ConversionJob::new(format!("/in/track{}.wma", i), self.output_dir.path(), "mp3"))
            .collect()
    }

    fn events(&self) -> Vec<BatchEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Waits until `count` jobs hold a worker slot and returns their pids.
    async fn wait_for_active(&self, count: usize) -> Vec<u32> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let active = self.runner.status().await.active_jobs;
            if active.len() >= count {
                return active.iter().filter_map(|j| j.pid).collect();
            }
            assert!(Instant::now() < deadline, "jobs never became active");
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn cancel(&self) -> BatchState {
        timeout(Duration::from_secs(10), self.runner.cancel())
            .await
            .expect("cancel should return once processes are reaped")
    }
}

fn process_exists(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Yields to the runtime while polling, so the runner's tasks keep running.
async fn wait_for_file(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_cancel_terminates_running_and_skips_queued() {
    let harness = CancelHarness::new(ScriptedTranscoder::new().with_default_script(HANG), 3, true);
    harness.runner.start(harness.jobs(5)).await.unwrap();

    let pids = harness.wait_for_active(3).await;
    assert_eq!(pids.len(), 3);
    assert!(pids.iter().all(|pid| process_exists(*pid)));

    let started = Instant::now();
    assert_eq!(harness.cancel().await, BatchState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));

    // Reaped, not merely signalled.
    for pid in &pids {
        assert!(!process_exists(*pid), "process {} still alive", pid);
    }

    // Queued jobs never reached the engine.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.transcoder.commanded().len(), 3);

    let status = harness.runner.status().await;
    assert_eq!(status.state, BatchState::Cancelled);
    assert_eq!(status.summary.cancelled, 3);
    assert_eq!(status.summary.not_started, 2);
    assert_eq!(status.progress.completed, 0);
    assert!(status.active_jobs.is_empty());

    let events = harness.events();
    let cancelled_reports = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                BatchEvent::JobCompleted {
                    outcome: JobOutcome::Cancelled,
                    ..
                }
            )
        })
        .count();
    assert_eq!(cancelled_reports, 3);

    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::BatchFinished { state, .. } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![BatchState::Cancelled]);
    assert!(matches!(events.last(), Some(BatchEvent::BatchFinished { .. })));
}

#[tokio::test]
async fn test_cancel_mid_batch_keeps_finished_work() {
    // Two quick jobs finish before the slow ones are cancelled.
    let transcoder = ScriptedTranscoder::new()
        .with_default_script(HANG)
        .with_script("track0.wma", "exit 0")
        .with_script("track1.wma", "exit 0");
    let harness = CancelHarness::new(transcoder, 2, true);
    harness.runner.start(harness.jobs(6)).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while harness.runner.status().await.progress.completed < 2 {
        assert!(Instant::now() < deadline, "quick jobs never finished");
        sleep(Duration::from_millis(10)).await;
    }
    harness.wait_for_active(2).await;

    assert_eq!(harness.cancel().await, BatchState::Cancelled);

    let summary = harness.runner.status().await.summary;
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.not_started, 2);
    // Every job that reached the engine was reported exactly once.
    assert_eq!(
        summary.succeeded + summary.failed + summary.cancelled,
        harness.transcoder.commanded().len()
    );
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let harness = CancelHarness::new(ScriptedTranscoder::new().with_default_script(HANG), 2, true);
    harness.runner.start(harness.jobs(2)).await.unwrap();
    harness.wait_for_active(2).await;

    assert_eq!(harness.cancel().await, BatchState::Cancelled);
    assert_eq!(harness.cancel().await, BatchState::Cancelled);

    let finished = harness
        .events()
        .iter()
        .filter(|e| matches!(e, BatchEvent::BatchFinished { .. }))
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_concurrent_cancel_and_wait() {
    let harness = CancelHarness::new(ScriptedTranscoder::new().with_default_script(HANG), 2, true);
    harness.runner.start(harness.jobs(4)).await.unwrap();
    harness.wait_for_active(2).await;

    let waiter = {
        let runner = Arc::clone(&harness.runner);
        tokio::spawn(async move { runner.wait().await })
    };
    let cancellers: Vec<_> = (0..3)
        .map(|_| {
            let runner = Arc::clone(&harness.runner);
            tokio::spawn(async move { runner.cancel().await })
        })
        .collect();

    for canceller in cancellers {
        let state = timeout(Duration::from_secs(10), canceller)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, BatchState::Cancelled);
    }
    let waited = timeout(Duration::from_secs(10), waiter).await.unwrap().unwrap();
    assert_eq!(waited, BatchState::Cancelled);
}

#[tokio::test]
async fn test_cancel_removes_partial_output() {
    let script = format!("echo partial > \"$2\"; {}", HANG);
    let harness = CancelHarness::new(ScriptedTranscoder::new().with_default_script(script), 1, true);
    let jobs = harness.jobs(1);
    let destination: PathBuf = jobs[0].destination.clone();

    harness.runner.start(jobs).await.unwrap();
    wait_for_file(&destination).await;

    assert_eq!(harness.cancel().await, BatchState::Cancelled);
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_cancel_keeps_partial_output_when_disabled() {
    let script = format!("echo partial > \"$2\"; {}", HANG);
    let harness = CancelHarness::new(ScriptedTranscoder::new().with_default_script(script), 1, false);
    let jobs = harness.jobs(1);
    let destination = jobs[0].destination.clone();

    harness.runner.start(jobs).await.unwrap();
    wait_for_file(&destination).await;

    assert_eq!(harness.cancel().await, BatchState::Cancelled);
    assert!(destination.exists());
}

#[tokio::test]
async fn test_failed_process_output_removed() {
    let script = "echo partial > \"$2\"; exit 1";
    let harness = CancelHarness::new(ScriptedTranscoder::new().with_default_script(script), 1, true);
    let jobs = harness.jobs(1);
    let destination = jobs[0].destination.clone();

    harness.runner.start(jobs).await.unwrap();
    let state = timeout(Duration::from_secs(10), harness.runner.wait())
        .await
        .unwrap();

    assert_eq!(state, BatchState::Completed);
    assert!(!destination.exists());
    assert_eq!(harness.runner.status().await.summary.failed, 1);
}

#[tokio::test]
async fn test_runner_restarts_after_cancel() {
    let harness = CancelHarness::new(
        ScriptedTranscoder::new()
            .with_default_script("exit 0")
            .with_script("track0.wma", HANG),
        1,
        true,
    );
    harness.runner.start(harness.jobs(1)).await.unwrap();
    harness.wait_for_active(1).await;
    assert_eq!(harness.cancel().await, BatchState::Cancelled);

    let second = vec![ConversionJob::new("/in/next.wma", harness.output_dir.path(), "mp3")];
    harness.runner.start(second).await.unwrap();
    let state = timeout(Duration::from_secs(10), harness.runner.wait())
        .await
        .unwrap();
    assert_eq!(state, BatchState::Completed);
    assert_eq!(harness.runner.status().await.progress.total, 1);
}
