//! Per-query execution configuration and the shared cancellation flag
//! every operator checks on entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vgraph_error::{ExecError, Result};

/// Tunables for one query's execution. Defaults mirror what a small
/// embedded workload needs: large enough batches to amortize
/// per-operator overhead, small enough morsels that a scheduler with a
/// handful of worker threads stays balanced.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub batch_capacity: usize,
    pub morsel_size: u64,
    pub max_threads: usize,
    pub deadline: Option<Duration>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            batch_capacity: vgraph_types::DEFAULT_VECTOR_CAPACITY,
            morsel_size: 100,
            max_threads: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            deadline: None,
        }
    }
}

/// Shared, cheaply cloneable per-query state: configuration, a
/// cancellation flag every operator polls on entry, and an optional wall
/// clock deadline.
#[derive(Clone)]
pub struct QueryContext {
    pub query_id: u64,
    pub config: Arc<ExecConfig>,
    interrupted: Arc<AtomicBool>,
    started_at: Instant,
}

impl QueryContext {
    #[must_use]
    pub fn new(query_id: u64, config: ExecConfig) -> Self {
        Self {
            query_id,
            config: Arc::new(config),
            interrupted: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
        }
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_past_deadline(&self) -> bool {
        self.config
            .deadline
            .is_some_and(|deadline| self.started_at.elapsed() >= deadline)
    }

    /// Called at the entry of every operator's `get_next_tuple`: a single
    /// check covering both explicit cancellation and deadline expiry.
    ///
    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Interrupted`] once cancelled or
    /// past the deadline.
    pub fn check_interrupted(&self) -> Result<()> {
        if self.is_interrupted() || self.is_past_deadline() {
            Err(ExecError::interrupted())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_not_interrupted() {
        let ctx = QueryContext::new(1, ExecConfig::default());
        assert!(ctx.check_interrupted().is_ok());
    }

    #[test]
    fn interrupt_is_observed_immediately() {
        let ctx = QueryContext::new(1, ExecConfig::default());
        ctx.interrupt();
        assert!(ctx.check_interrupted().is_err());
    }

    #[test]
    fn cloned_context_shares_the_same_interrupt_flag() {
        let ctx = QueryContext::new(1, ExecConfig::default());
        let clone = ctx.clone();
        clone.interrupt();
        assert!(ctx.is_interrupted());
    }

    #[test]
    fn deadline_in_the_past_trips_immediately() {
        let mut config = ExecConfig::default();
        config.deadline = Some(Duration::from_nanos(1));
        let ctx = QueryContext::new(1, config);
        std::thread::sleep(Duration::from_millis(5));
        assert!(ctx.check_interrupted().is_err());
    }
}
