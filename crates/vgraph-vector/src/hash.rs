//! Key hashing and the lock-free build-side hash table used by hash join,
//! hash aggregate, and semi-mask insertion.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;
use vgraph_types::Value;

/// `NULL` hashes to this sentinel so a NULL key never collides with a
/// real value by accident (a NULL key is filtered out before probing
/// anyway, since NULL never equals NULL in join semantics).
pub const NULL_HASH: u64 = u64::MAX;

/// Single-multiply finalizer applied to every scalar key component before
/// combination. Not a full avalanche mix (compare a `SplitMix64`-style
/// finalizer) — this is the one used throughout the join/aggregate hot
/// path, where combine_hash below provides the extra mixing needed for
/// multi-column keys.
#[must_use]
pub const fn murmur_finalizer(x: u64) -> u64 {
    x.wrapping_mul(0xbf58_476d_1ce4_e5b9)
}

/// Combine a running hash `seed` with the next key component's hash `x`.
#[must_use]
pub const fn combine_hash(seed: u64, x: u64) -> u64 {
    murmur_finalizer(seed) ^ x
}

/// Hash one scalar value. NULL always hashes to [`NULL_HASH`]; all other
/// representations feed their bit pattern through [`murmur_finalizer`].
#[must_use]
pub fn hash_value(value: &Value) -> u64 {
    match value {
        Value::Null => NULL_HASH,
        Value::Bool(b) => murmur_finalizer(u64::from(*b)),
        Value::Int16(n) => murmur_finalizer(i64::from(*n) as u64),
        Value::Int32(n) => murmur_finalizer(i64::from(*n) as u64),
        Value::Int64(n) => murmur_finalizer(*n as u64),
        Value::Float(f) => murmur_finalizer(u64::from(f.to_bits())),
        Value::Double(d) => murmur_finalizer(d.to_bits()),
        Value::Date(d) => murmur_finalizer(i64::from(*d) as u64),
        Value::Timestamp(t) => murmur_finalizer(*t as u64),
        Value::Interval(iv) => combine_hash(
            combine_hash(
                murmur_finalizer(i64::from(iv.months) as u64),
                murmur_finalizer(i64::from(iv.days) as u64),
            ),
            murmur_finalizer(iv.micros as u64),
        ),
        Value::String(s) => hash_bytes(s.as_bytes()),
        Value::Blob(b) => hash_bytes(b),
        Value::Node(id) => combine_hash(murmur_finalizer(id.offset), murmur_finalizer(u64::from(id.table_id))),
        Value::Rel(id) => combine_hash(murmur_finalizer(id.offset), murmur_finalizer(u64::from(id.table_id))),
        Value::List(items) => items
            .iter()
            .fold(0xcbf2_9ce4_8422_2325, |seed, item| combine_hash(seed, hash_value(item))),
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut seed: u64 = bytes.len() as u64;
    for chunk in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        seed = combine_hash(seed, u64::from_le_bytes(buf));
    }
    murmur_finalizer(seed)
}

/// Hash a multi-column key by folding each column's hash through
/// [`combine_hash`], matching the "hash = Murmur64(k1) ⊕ Murmur64(k2) ⊕ …"
/// composition used by multi-key joins and group-by.
#[must_use]
pub fn hash_key(columns: &[Value]) -> u64 {
    columns
        .iter()
        .fold(0x9e37_79b9_7f4a_7c15, |seed, col| combine_hash(seed, hash_value(col)))
}

/// Round up to the build-side hash table's slot-array size: the smallest
/// power of two at least `2 * n` (so the average chain length stays
/// under 1 even when every key is distinct).
#[must_use]
pub fn capacity_for(num_rows: usize) -> usize {
    let target = (num_rows.max(1) * 2).max(2);
    target.next_power_of_two()
}

/// A lock-free, open-addressed (by chaining) hash table over row indices
/// into a build-side `FactorizedTable`.
///
/// Each slot holds the most-recently-inserted row whose key hashed to
/// that slot, plus 1 (0 means empty); the same row's previous occupant of
/// that slot is recorded in a parallel `prev` array, so probing walks the
/// slot's singly-linked chain. Insertion is a Treiber-stack-style CAS
/// loop: no locks, multiple builder threads may insert concurrently.
pub struct HashTable {
    slots: Vec<AtomicU64>,
    prev: Vec<AtomicU64>,
    mask: u64,
}

impl HashTable {
    #[must_use]
    pub fn new(num_rows: usize) -> Self {
        let capacity = capacity_for(num_rows);
        trace!(num_rows, capacity, "build-side hash table allocated");
        Self {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            prev: (0..num_rows).map(|_| AtomicU64::new(0)).collect(),
            mask: (capacity - 1) as u64,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot_for(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    /// Insert `row_idx` (already appended to the build table) under `hash`.
    pub fn insert(&self, hash: u64, row_idx: usize) {
        let slot_idx = self.slot_for(hash);
        let slot = &self.slots[slot_idx];
        let mut head = slot.load(Ordering::Relaxed);
        loop {
            self.prev[row_idx].store(head, Ordering::Relaxed);
            match slot.compare_exchange_weak(
                head,
                row_idx as u64 + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
    }

    /// Iterate the chain of build-row indices hashing to `hash`, most
    /// recently inserted first.
    #[must_use]
    pub fn probe(&self, hash: u64) -> ChainIter<'_> {
        ChainIter {
            table: self,
            next: self.slots[self.slot_for(hash)].load(Ordering::Acquire),
        }
    }
}

pub struct ChainIter<'a> {
    table: &'a HashTable,
    next: u64,
}

impl Iterator for ChainIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == 0 {
            return None;
        }
        let row_idx = (self.next - 1) as usize;
        self.next = self.table.prev[row_idx].load(Ordering::Acquire);
        Some(row_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_always_hashes_to_sentinel() {
        assert_eq!(hash_value(&Value::Null), NULL_HASH);
    }

    #[test]
    fn equal_values_hash_equal() {
        assert_eq!(
            hash_value(&Value::Int64(42)),
            hash_value(&Value::Int64(42))
        );
        assert_eq!(
            hash_value(&Value::String("abc".into())),
            hash_value(&Value::String("abc".into()))
        );
    }

    #[test]
    fn capacity_is_a_power_of_two_at_least_double() {
        assert_eq!(capacity_for(1), 2);
        assert_eq!(capacity_for(3), 8);
        assert_eq!(capacity_for(1000), 2048);
    }

    #[test]
    fn chained_inserts_are_all_reachable_by_probe() {
        let table = HashTable::new(4);
        for row_idx in 0..4 {
            table.insert(7, row_idx);
        }
        let chain: Vec<usize> = table.probe(7).collect();
        assert_eq!(chain.len(), 4);
        assert!((0..4).all(|i| chain.contains(&i)));
    }

    #[test]
    fn distinct_hashes_do_not_collide_in_a_fresh_table() {
        let table = HashTable::new(2);
        table.insert(1, 0);
        table.insert(2, 1);
        assert_eq!(table.probe(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(table.probe(2).collect::<Vec<_>>(), vec![1]);
    }

    proptest::proptest! {
        #[test]
        fn capacity_for_is_always_a_power_of_two_at_least_double(num_rows in 1usize..10_000) {
            let capacity = capacity_for(num_rows);
            proptest::prop_assert!(capacity.is_power_of_two());
            proptest::prop_assert!(capacity >= num_rows * 2);
        }

        #[test]
        fn every_inserted_row_is_reachable_through_its_own_hash(hashes in proptest::collection::vec(0u64..16, 1..64)) {
            let table = HashTable::new(hashes.len());
            for (row_idx, &hash) in hashes.iter().enumerate() {
                table.insert(hash, row_idx);
            }
            for (row_idx, &hash) in hashes.iter().enumerate() {
                proptest::prop_assert!(table.probe(hash).any(|found| found == row_idx));
            }
        }
    }
}
