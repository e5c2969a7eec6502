//! Bounded concurrent batch runner.
//!
//! The runner drives one batch of conversion jobs at a time:
//! - **WorkerPool**: at most N conversion processes run at once, the rest wait
//!   in a FIFO queue
//! - **ProgressTracker**: atomic completed/total counter, one per batch
//! - **CancellationFlag**: set once by `cancel()`, polled by every worker
//!
//! `cancel()` returns only after every process the batch started has been
//! terminated and reaped.
//!
//! # Example
//!
//! ```ignore
//! use batchconv_core::batch::{BatchConfig, BatchRunner, channel_callback};
//! use batchconv_core::converter::FfmpegTranscoder;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let runner = BatchRunner::new(BatchConfig::default(), Arc::new(FfmpegTranscoder::with_defaults()))
//!     .with_callback(channel_callback(tx));
//!
//! runner.start(jobs).await?;
//! while let Some(event) = rx.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

mod cancel;
mod config;
mod context;
mod pool;
mod runner;
mod tracker;
mod types;

pub use cancel::CancellationFlag;
pub use config::BatchConfig;
pub use runner::BatchRunner;
pub use tracker::ProgressTracker;
pub use types::{
    channel_callback, ActiveJob, BatchError, BatchEvent, BatchEventCallback, BatchId, BatchState,
    BatchStatus, BatchSummary, JobError, JobOutcome, Progress,
};
