//! Lightweight counters for the vectorized execution path, read by the
//! progress display and surfaced through tracing spans.

use std::sync::atomic::{AtomicU64, Ordering};

/// Row/batch throughput counters for one pipeline or operator instance.
/// All fields are independent atomics rather than a mutex-guarded struct
/// since workers only ever increment, never read-modify-write across
/// fields together.
#[derive(Default)]
pub struct VectorMetrics {
    rows_processed: AtomicU64,
    batches_processed: AtomicU64,
    rows_filtered: AtomicU64,
}

impl VectorMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&self, rows_in_batch: u64, rows_selected: u64) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.rows_processed.fetch_add(rows_in_batch, Ordering::Relaxed);
        self.rows_filtered
            .fetch_add(rows_in_batch.saturating_sub(rows_selected), Ordering::Relaxed);
    }

    #[must_use]
    pub fn rows_processed(&self) -> u64 {
        self.rows_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn batches_processed(&self) -> u64 {
        self.batches_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rows_filtered(&self) -> u64 {
        self.rows_filtered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn selectivity(&self) -> f64 {
        let total = self.rows_processed();
        if total == 0 {
            return 1.0;
        }
        1.0 - (self.rows_filtered() as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectivity_reflects_filtered_rows() {
        let metrics = VectorMetrics::new();
        metrics.record_batch(100, 25);
        assert_eq!(metrics.rows_processed(), 100);
        assert_eq!(metrics.rows_filtered(), 75);
        assert!((metrics.selectivity() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_metrics_report_full_selectivity() {
        let metrics = VectorMetrics::new();
        assert!((metrics.selectivity() - 1.0).abs() < 1e-9);
    }
}
