//! Batch runner configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the batch runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of conversions allowed to run at once.
    /// When unset, one less than the number of CPUs (at least 1).
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// How often a worker checks its process and the cancellation flag (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Poll intervals to wait during cancellation before warning that processes
    /// are slow to exit. Cancellation keeps waiting afterwards.
    #[serde(default = "default_cancel_grace_polls")]
    pub cancel_grace_polls: u32,

    /// Remove the destination file of a cancelled or failed conversion.
    #[serde(default = "default_remove_partial")]
    pub remove_partial_outputs: bool,
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_cancel_grace_polls() -> u32 {
    3
}

fn default_remove_partial() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            poll_interval_ms: default_poll_interval(),
            cancel_grace_polls: default_cancel_grace_polls(),
            remove_partial_outputs: default_remove_partial(),
        }
    }
}

impl BatchConfig {
    /// Sets the maximum number of concurrent conversions.
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = Some(max);
        self
    }

    /// Sets the worker poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Time `cancel()` waits before warning about slow processes.
    pub fn cancel_grace(&self) -> Duration {
        self.poll_interval() * self.cancel_grace_polls.max(1)
    }

    /// Resolved pool size.
    ///
    /// An explicit `max_workers` is returned as-is (zero is rejected when the
    /// pool is built); otherwise one core is left for the control thread.
    pub fn worker_count(&self) -> usize {
        match self.max_workers {
            Some(n) => n,
            None => num_cpus::get().saturating_sub(1).max(1),
        }
    }
}
