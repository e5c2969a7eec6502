//! Completed-job counter shared by the workers of one batch.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::Progress;

/// Thread-safe counter of finished jobs against a known total.
///
/// `completed` only moves forward and never passes `total`. The tracker is
/// single-use: one per batch.
#[derive(Debug)]
pub struct ProgressTracker {
    completed: AtomicUsize,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Adds one and returns the new pair in a single atomic step.
    ///
    /// Exactly one caller observes `completed == total`. Returns `None` if the
    /// tracker is already full.
    pub fn increment(&self) -> Option<Progress> {
        let total = self.total;
        self.completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                (c < total).then_some(c + 1)
            })
            .ok()
            .map(|previous| Progress {
                completed: previous + 1,
                total,
            })
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed.load(Ordering::Acquire),
            total: self.total,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }
}
