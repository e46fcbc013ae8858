//! The recursive-extend (BFS) engine behind variable-length path queries
//! and shortest-path queries: one [`IfeMorsel`] per source node tracks
//! which destinations have been reached, at what hop count, while the
//! frontier itself is scanned and extended morsel by morsel so several
//! worker threads can share one source's BFS.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use vgraph_storage::{Direction, RelTable, Transaction};
use vgraph_types::NodeId;

const NOT_VISITED: u8 = 0;
const VISITED: u8 = 1;

/// The current BFS level's frontier: sparse once it's a small fraction of
/// all offsets, dense (one flag per offset) once it isn't — matching the
/// reference engine's crossover, `frontier_size < ceil(max_offset / 8)`.
enum Frontier {
    Sparse(Vec<u64>),
    Dense(Vec<bool>),
}

/// A claimed slice of the current frontier: either a list of offsets (if
/// sparse) or a raw `[start, end)` range to re-check against the dense
/// bitmap (if dense).
pub enum FrontierMorsel {
    Sparse(Vec<u64>),
    DenseRange { start: u64, end: u64 },
}

/// Per-source BFS state, shared by every worker thread extending the
/// same source node's frontier.
pub struct IfeMorsel {
    pub src_offset: u64,
    lower_bound: u64,
    upper_bound: u64,
    num_dst_nodes_to_visit: u64,
    max_offset: u64,

    current_level: AtomicU64,
    current_frontier_size: AtomicU64,
    next_frontier_size: AtomicU64,
    next_scan_start_idx: AtomicU64,
    num_visited_dst_nodes: AtomicU64,

    visited: Vec<AtomicU8>,
    path_length: Vec<AtomicU64>,
    dst_nodes_to_visit: HashSet<u64>,

    frontier: Mutex<Frontier>,
    next_frontier: Mutex<Vec<u64>>,
}

impl IfeMorsel {
    #[must_use]
    pub fn new(
        src_offset: u64,
        max_offset: u64,
        lower_bound: u64,
        upper_bound: u64,
        dst_nodes_to_visit: HashSet<u64>,
    ) -> Self {
        let num_dst_nodes_to_visit = dst_nodes_to_visit.len() as u64;
        let mut morsel = Self {
            src_offset,
            lower_bound,
            upper_bound,
            num_dst_nodes_to_visit,
            max_offset,
            current_level: AtomicU64::new(0),
            current_frontier_size: AtomicU64::new(1),
            next_frontier_size: AtomicU64::new(0),
            next_scan_start_idx: AtomicU64::new(0),
            num_visited_dst_nodes: AtomicU64::new(0),
            visited: (0..=max_offset).map(|_| AtomicU8::new(NOT_VISITED)).collect(),
            path_length: (0..=max_offset).map(|_| AtomicU64::new(0)).collect(),
            dst_nodes_to_visit,
            frontier: Mutex::new(Frontier::Sparse(vec![src_offset])),
            next_frontier: Mutex::new(Vec::new()),
        };
        morsel.visited[src_offset as usize].store(VISITED, Ordering::Relaxed);
        if morsel.dst_nodes_to_visit.contains(&src_offset) && lower_bound == 0 {
            morsel.num_visited_dst_nodes.store(1, Ordering::Relaxed);
        }
        morsel
    }

    #[must_use]
    pub fn current_level(&self) -> u64 {
        self.current_level.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn path_length_of(&self, offset: u64) -> Option<u64> {
        if self.visited[offset as usize].load(Ordering::Acquire) == VISITED {
            Some(self.path_length[offset as usize].load(Ordering::Acquire))
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_bfs_complete(&self) -> bool {
        self.current_level() == self.upper_bound
            || self.current_frontier_size.load(Ordering::Acquire) == 0
            || self.num_visited_dst_nodes.load(Ordering::Acquire) == self.num_dst_nodes_to_visit
    }

    /// Claim the next slice of the current frontier to extend.
    pub fn get_morsel(&self, morsel_size: u64) -> Option<FrontierMorsel> {
        let frontier = self.frontier.lock();
        let bound = match &*frontier {
            Frontier::Sparse(v) => v.len() as u64,
            Frontier::Dense(bits) => bits.len() as u64,
        };
        let start = self.next_scan_start_idx.fetch_add(morsel_size, Ordering::Relaxed);
        if start >= bound {
            return None;
        }
        let end = (start + morsel_size).min(bound);
        match &*frontier {
            Frontier::Sparse(v) => Some(FrontierMorsel::Sparse(v[start as usize..end as usize].to_vec())),
            Frontier::Dense(_) => Some(FrontierMorsel::DenseRange { start, end }),
        }
    }

    /// True for offsets actually present in the claimed dense range (only
    /// relevant for `FrontierMorsel::DenseRange`).
    #[must_use]
    pub fn dense_contains(&self, offset: u64) -> bool {
        match &*self.frontier.lock() {
            Frontier::Dense(bits) => bits[offset as usize],
            Frontier::Sparse(_) => false,
        }
    }

    /// Mark `offset` visited at the level one past the current one.
    /// Returns `true` the first time (and only the first time) any
    /// worker marks it — callers should only emit a path-extension tuple
    /// on `true`.
    pub fn mark_visited(&self, offset: u64) -> bool {
        if self.visited[offset as usize]
            .compare_exchange(NOT_VISITED, VISITED, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let next_level = self.current_level() + 1;
        self.path_length[offset as usize].store(next_level, Ordering::Release);
        self.next_frontier.lock().push(offset);
        self.next_frontier_size.fetch_add(1, Ordering::AcqRel);
        if self.dst_nodes_to_visit.contains(&offset) && next_level >= self.lower_bound {
            self.num_visited_dst_nodes.fetch_add(1, Ordering::AcqRel);
        }
        true
    }

    /// Advance to the next BFS level, swapping in the frontier collected
    /// during the level just finished.
    pub fn initialize_next_frontier(&self) {
        self.current_level.fetch_add(1, Ordering::AcqRel);
        let mut next = self.next_frontier.lock();
        let collected = std::mem::take(&mut *next);
        let size = collected.len() as u64;
        self.current_frontier_size.store(size, Ordering::Release);
        self.next_frontier_size.store(0, Ordering::Release);
        self.next_scan_start_idx.store(0, Ordering::Release);

        let sparse_threshold = self.max_offset.div_ceil(8);
        let dense = size >= sparse_threshold;
        debug!(level = self.current_level(), frontier_size = size, dense, "bfs frontier advanced");
        let mut frontier = self.frontier.lock();
        *frontier = if dense {
            let mut bits = vec![false; (self.max_offset + 1) as usize];
            for offset in collected {
                bits[offset as usize] = true;
            }
            Frontier::Dense(bits)
        } else {
            let mut sorted = collected;
            sorted.sort_unstable();
            Frontier::Sparse(sorted)
        };
    }
}

/// Run a full single-source BFS to completion using a plain driver loop
/// rather than the morsel/worker-pool machinery, returning each requested
/// destination offset that was reached within `[lower_bound, upper_bound]`
/// hops together with the hop count at which it was first reached
/// (shortest path length). Offsets visited along the way that were not in
/// `dst_nodes_to_visit` are not part of the result — the frontier still
/// passes through them, but a caller only asked about specific destinations.
#[must_use]
pub fn run_bfs(
    rel_table: &dyn RelTable,
    tx: &Transaction,
    src: NodeId,
    direction: Direction,
    lower_bound: u64,
    upper_bound: u64,
    dst_nodes_to_visit: HashSet<u64>,
    max_offset: u64,
) -> Vec<(u64, u64)> {
    let destinations = dst_nodes_to_visit.clone();
    debug!(
        src_offset = src.offset,
        lower_bound,
        upper_bound,
        num_destinations = destinations.len(),
        "bfs started"
    );
    let morsel = IfeMorsel::new(src.offset, max_offset, lower_bound, upper_bound, dst_nodes_to_visit);

    while !morsel.is_bfs_complete() {
        while let Some(claimed) = morsel.get_morsel(64) {
            let offsets: Vec<u64> = match claimed {
                FrontierMorsel::Sparse(v) => v,
                FrontierMorsel::DenseRange { start, end } => {
                    (start..end).filter(|&o| morsel.dense_contains(o)).collect()
                }
            };
            for offset in offsets {
                let node = NodeId::new(offset, src.table_id);
                for (neighbor, _rel_id) in rel_table.neighbors(tx, node, direction) {
                    morsel.mark_visited(neighbor.offset);
                }
            }
        }
        if morsel.is_bfs_complete() {
            break;
        }
        morsel.initialize_next_frontier();
    }

    let mut result: Vec<(u64, u64)> = destinations
        .into_iter()
        .filter_map(|offset| {
            morsel
                .path_length_of(offset)
                .filter(|&len| len >= lower_bound && len <= upper_bound)
                .map(|len| (offset, len))
        })
        .collect();
    result.sort_unstable();
    debug!(final_level = morsel.current_level(), reached = result.len(), "bfs finished");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vgraph_storage::{InMemoryRelTable, TransactionManager, TransactionMode};

    fn chain_graph(len: u64) -> (InMemoryRelTable, Transaction) {
        let rel_table = InMemoryRelTable::new(0);
        let manager = TransactionManager::new();
        let tx = manager.begin(TransactionMode::Write);
        for i in 0..len {
            rel_table
                .insert(&tx, NodeId::new(i, 1), NodeId::new(i + 1, 1), HashMap::new())
                .unwrap();
        }
        rel_table.commit(&tx);
        (rel_table, manager.begin(TransactionMode::ReadOnly))
    }

    #[test]
    fn shortest_path_length_along_a_chain() {
        let (rel_table, tx) = chain_graph(5);
        let src = NodeId::new(0, 1);
        let dsts: HashSet<u64> = [3].into_iter().collect();
        let result = run_bfs(&rel_table, &tx, src, Direction::Forward, 1, 10, dsts, 10);
        assert_eq!(result, vec![(3, 3)]);
    }

    #[test]
    fn upper_bound_excludes_farther_destinations() {
        let (rel_table, tx) = chain_graph(5);
        let src = NodeId::new(0, 1);
        let dsts: HashSet<u64> = [4].into_iter().collect();
        let result = run_bfs(&rel_table, &tx, src, Direction::Forward, 1, 2, dsts, 10);
        assert!(result.is_empty());
    }

    #[test]
    fn every_destination_gets_its_true_shortest_distance() {
        // A diamond: 0 -> 1 -> 3 and 0 -> 2 -> 3, both length 2 to node 3.
        let rel_table = InMemoryRelTable::new(0);
        let manager = TransactionManager::new();
        let tx = manager.begin(TransactionMode::Write);
        for (a, b) in [(0, 1), (0, 2), (1, 3), (2, 3)] {
            rel_table
                .insert(&tx, NodeId::new(a, 1), NodeId::new(b, 1), HashMap::new())
                .unwrap();
        }
        rel_table.commit(&tx);
        let reader = manager.begin(TransactionMode::ReadOnly);

        let dsts: HashSet<u64> = [3].into_iter().collect();
        let result = run_bfs(&rel_table, &reader, NodeId::new(0, 1), Direction::Forward, 1, 10, dsts, 10);
        assert_eq!(result, vec![(3, 2)]);
    }
}
