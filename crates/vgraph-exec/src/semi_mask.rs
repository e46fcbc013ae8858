//! Semi-masks: sideways information passing from a join's build side back
//! into an upstream node scan, so the scan never produces a row the join
//! would immediately discard.
//!
//! Several joins may mask the same scan (e.g. two different hash joins
//! both restricting the same `MATCH (a:Person)`); a node only survives if
//! *every* masker marked it, which is why marking is modeled as a counter
//! that only advances when it already equals the marking masker's index —
//! out-of-order or partial marking simply never reaches `num_maskers`.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// A per-offset AND-counter plus a per-morsel summary bit, so a scan can
/// skip an entire morsel in one check when nothing in it survived.
pub struct SemiMask {
    counts: Vec<AtomicU8>,
    morsel_live_count: Vec<AtomicU64>,
    morsel_size: u64,
    num_maskers: AtomicU8,
}

impl SemiMask {
    #[must_use]
    pub fn new(num_offsets: usize, morsel_size: u64) -> Self {
        let num_morsels = (num_offsets as u64).div_ceil(morsel_size.max(1)) as usize;
        Self {
            counts: (0..num_offsets).map(|_| AtomicU8::new(0)).collect(),
            morsel_live_count: (0..num_morsels.max(1)).map(|_| AtomicU64::new(0)).collect(),
            morsel_size: morsel_size.max(1),
            num_maskers: AtomicU8::new(0),
        }
    }

    /// Called once per masking join at plan-build time; returns this
    /// masker's assigned index.
    pub fn register_masker(&self) -> u8 {
        self.num_maskers.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub fn num_maskers(&self) -> u8 {
        self.num_maskers.load(Ordering::Acquire)
    }

    /// Mark `offset` as surviving masker `masker_idx`. A CAS loop: only
    /// advances the counter when it is already exactly `masker_idx`,
    /// implementing the AND-across-maskers semantics regardless of the
    /// order in which maskers run.
    pub fn mark(&self, offset: usize, masker_idx: u8) {
        let counter = &self.counts[offset];
        let mut current = counter.load(Ordering::Relaxed);
        loop {
            if current != masker_idx {
                return;
            }
            match counter.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let morsel_idx = (offset as u64 / self.morsel_size) as usize;
                    self.morsel_live_count[morsel_idx].fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    #[must_use]
    pub fn is_masked(&self, offset: usize) -> bool {
        self.counts[offset].load(Ordering::Acquire) == self.num_maskers()
    }

    /// Whether morsel `morsel_idx` has at least one fully-masked offset,
    /// letting a scan skip the whole morsel when it doesn't.
    #[must_use]
    pub fn morsel_has_any_live(&self, morsel_idx: usize) -> bool {
        self.morsel_live_count[morsel_idx].load(Ordering::Acquire) > 0
    }
}
