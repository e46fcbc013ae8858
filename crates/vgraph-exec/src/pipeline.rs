//! Morsel-driven scheduling: offset ranges handed out atomically to
//! worker threads, and a work-stealing task queue (built on
//! `crossbeam-deque`) that lets a pipeline-breaker operator (BFS's next
//! frontier, a hash join's build phase) fan out follow-up work instead of
//! draining strictly source-to-sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use tracing::trace;

/// A half-open `[start, end)` range of row/node offsets, the unit one
/// worker claims and fully processes before asking for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Morsel {
    pub start: u64,
    pub end: u64,
}

impl Morsel {
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Hands out `[start, end)` ranges over `0..bound` via a single atomic
/// `fetch_add`, so any number of worker threads can call `next_morsel`
/// concurrently without ever double-dispatching an offset.
pub struct MorselDispatcher {
    next_start: AtomicU64,
    bound: u64,
}

impl MorselDispatcher {
    #[must_use]
    pub const fn new(bound: u64) -> Self {
        Self {
            next_start: AtomicU64::new(0),
            bound,
        }
    }

    /// Claim the next morsel of at most `morsel_size` offsets, or `None`
    /// once `bound` has been fully dispatched.
    pub fn next_morsel(&self, morsel_size: u64) -> Option<Morsel> {
        let start = self.next_start.fetch_add(morsel_size, Ordering::Relaxed);
        if start >= self.bound {
            return None;
        }
        let end = (start + morsel_size).min(self.bound);
        trace!(start, end, bound = self.bound, "morsel dispatched");
        Some(Morsel { start, end })
    }

    #[must_use]
    pub const fn bound(&self) -> u64 {
        self.bound
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// A work-stealing pool: `spawn` injects a task, `run_to_completion`
/// blocks until every injected task (including tasks injected by other
/// tasks while running) has executed.
pub struct TaskScheduler {
    injector: Arc<Injector<Task>>,
    num_workers: usize,
}

impl TaskScheduler {
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            injector: Arc::new(Injector::new()),
            num_workers: num_workers.max(1),
        }
    }

    pub fn spawn(&self, task: impl FnOnce() + Send + 'static) {
        self.injector.push(Box::new(task));
    }

    /// Run `num_workers` threads until the injector and every worker's
    /// local queue are empty. Tasks may themselves call `spawn` (via a
    /// cloned `TaskScheduler` handle) to add more work while running.
    pub fn run_to_completion(&self) {
        trace!(num_workers = self.num_workers, "task scheduler starting");
        let workers: Vec<Worker<Task>> = (0..self.num_workers).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Task>> = workers.iter().map(Worker::stealer).collect();

        std::thread::scope(|scope| {
            for worker in workers {
                let injector = Arc::clone(&self.injector);
                let stealers = stealers.clone();
                scope.spawn(move || {
                    run_worker(&worker, &injector, &stealers);
                });
            }
        });
    }
}

fn run_worker(local: &Worker<Task>, injector: &Injector<Task>, stealers: &[Stealer<Task>]) {
    loop {
        let task = local.pop().or_else(|| {
            std::iter::repeat_with(|| {
                injector
                    .steal_batch_and_pop(local)
                    .or_else(|| stealers.iter().map(Stealer::steal).collect())
            })
            .find(|s| !s.is_retry())
            .and_then(Steal::success)
        });
        match task {
            Some(task) => task(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as Counter;

    #[test]
    fn morsels_partition_the_bound_with_no_overlap_and_no_gap() {
        let dispatcher = MorselDispatcher::new(25);
        let mut morsels = Vec::new();
        while let Some(m) = dispatcher.next_morsel(10) {
            morsels.push(m);
        }
        assert_eq!(morsels, vec![
            Morsel { start: 0, end: 10 },
            Morsel { start: 10, end: 20 },
            Morsel { start: 20, end: 25 },
        ]);
    }

    #[test]
    fn concurrent_dispatch_never_double_assigns_an_offset() {
        let dispatcher = Arc::new(MorselDispatcher::new(10_000));
        let seen = Arc::new(std::sync::Mutex::new(vec![false; 10_000]));
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let dispatcher = Arc::clone(&dispatcher);
                let seen = Arc::clone(&seen);
                scope.spawn(move || {
                    while let Some(m) = dispatcher.next_morsel(37) {
                        let mut seen = seen.lock().unwrap();
                        for offset in m.start..m.end {
                            assert!(!seen[offset as usize], "offset {offset} dispatched twice");
                            seen[offset as usize] = true;
                        }
                    }
                });
            }
        });
        assert!(seen.lock().unwrap().iter().all(|&b| b));
    }

    #[test]
    fn task_scheduler_runs_every_spawned_task() {
        let scheduler = TaskScheduler::new(4);
        let counter = Arc::new(Counter::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            scheduler.spawn(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        scheduler.run_to_completion();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    proptest::proptest! {
        #[test]
        fn morsels_always_partition_the_bound_for_arbitrary_sizes(bound in 0u64..5000, morsel_size in 1u64..200) {
            let dispatcher = MorselDispatcher::new(bound);
            let mut covered = vec![false; bound as usize];
            while let Some(m) = dispatcher.next_morsel(morsel_size) {
                for offset in m.start..m.end {
                    proptest::prop_assert!(!covered[offset as usize]);
                    covered[offset as usize] = true;
                }
            }
            proptest::prop_assert!(covered.iter().all(|&c| c));
        }
    }
}
