//! Query progress reporting: a whole-percent-coalescing display so a
//! long-running scan doesn't spam a terminal with a fractional update on
//! every morsel.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress updates for one query. Implementations decide where
/// the update goes (a terminal, a log line, nowhere); the execution core
/// only guarantees it calls `update` with a non-decreasing fraction.
pub trait ProgressBarDisplay: Send + Sync {
    fn update(&self, query_id: u64, fraction_complete: f64, pipelines_finished: u64, pipelines_total: u64);
    fn finish(&self, query_id: u64);
}

/// Tracks the last whole percent reported and only calls through to the
/// display when the percent actually changes, mirroring how a terminal
/// progress bar avoids re-rendering on every morsel of progress.
pub struct CoalescingProgressTracker<D: ProgressBarDisplay> {
    display: D,
    last_reported_percent: AtomicU64,
}

impl<D: ProgressBarDisplay> CoalescingProgressTracker<D> {
    #[must_use]
    pub const fn new(display: D) -> Self {
        Self {
            display,
            last_reported_percent: AtomicU64::new(u64::MAX),
        }
    }

    /// Report progress as `pipelines_finished / pipelines_total`, skipping
    /// the call to `display` unless the whole percent changed since the
    /// last report.
    pub fn report(&self, query_id: u64, pipelines_finished: u64, pipelines_total: u64) {
        if pipelines_total == 0 {
            return;
        }
        let fraction = pipelines_finished as f64 / pipelines_total as f64;
        let percent = (fraction * 100.0).floor() as u64;
        let previous = self.last_reported_percent.swap(percent, Ordering::AcqRel);
        if previous != percent {
            self.display.update(query_id, fraction, pipelines_finished, pipelines_total);
        }
    }

    pub fn finish(&self, query_id: u64) {
        self.display.finish(query_id);
    }
}

/// A display that records every call it received, for tests and for
/// embedding contexts with no terminal to write to.
#[derive(Default)]
pub struct RecordingProgressDisplay {
    pub updates: parking_lot::Mutex<Vec<(u64, u64)>>,
    pub finished: parking_lot::Mutex<Vec<u64>>,
}

impl ProgressBarDisplay for RecordingProgressDisplay {
    fn update(&self, query_id: u64, _fraction_complete: f64, pipelines_finished: u64, _pipelines_total: u64) {
        self.updates.lock().push((query_id, pipelines_finished));
    }

    fn finish(&self, query_id: u64) {
        self.finished.lock().push(query_id);
    }
}
