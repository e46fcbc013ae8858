//! Relationship tables: like [`crate::node_table::InMemoryNodeTable`], a
//! committed store plus a transaction-local overlay, but additionally
//! maintaining forward/backward adjacency so the execution core's extend
//! operators can walk a node's neighbors without a full table scan.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;
use vgraph_error::{ExecError, Result};
use vgraph_types::{NodeId, RelId, TableId, Value};

use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

type PropertyRow = HashMap<String, Value>;

struct RelEntry {
    src: NodeId,
    dst: NodeId,
    properties: PropertyRow,
}

#[derive(Default)]
struct Overlay {
    inserts: HashMap<u64, RelEntry>,
    updates: HashMap<u64, PropertyRow>,
    deletes: HashSet<u64>,
}

#[derive(Default)]
struct Committed {
    rows: HashMap<u64, RelEntry>,
    fwd_adj: HashMap<NodeId, Vec<(NodeId, RelId)>>,
    bwd_adj: HashMap<NodeId, Vec<(NodeId, RelId)>>,
}

pub trait RelTable: Send + Sync {
    fn table_id(&self) -> TableId;

    /// Committed (and this transaction's uncommitted) neighbors of `node`
    /// in `direction`, as `(neighbor, rel_id)` pairs.
    fn neighbors(&self, tx: &Transaction, node: NodeId, direction: Direction) -> Vec<(NodeId, RelId)>;

    fn get_property(&self, tx: &Transaction, rel_id: RelId, property: &str) -> Result<Value>;

    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Transaction`] if `tx` is
    /// read-only.
    fn insert(&self, tx: &Transaction, src: NodeId, dst: NodeId, properties: PropertyRow) -> Result<RelId>;

    fn set_property(&self, tx: &Transaction, rel_id: RelId, property: &str, value: Value) -> Result<()>;

    fn delete(&self, tx: &Transaction, rel_id: RelId) -> Result<()>;

    fn commit(&self, tx: &Transaction);

    fn rollback(&self, tx: &Transaction);
}

pub struct InMemoryRelTable {
    table_id: TableId,
    next_offset: AtomicU64,
    committed: RwLock<Committed>,
    overlays: RwLock<HashMap<u64, Overlay>>,
}

impl InMemoryRelTable {
    #[must_use]
    pub fn new(table_id: TableId) -> Self {
        Self {
            table_id,
            next_offset: AtomicU64::new(0),
            committed: RwLock::new(Committed::default()),
            overlays: RwLock::new(HashMap::new()),
        }
    }

    fn require_write(tx: &Transaction) -> Result<()> {
        if tx.is_write() {
            Ok(())
        } else {
            Err(ExecError::transaction("read-only transaction attempted a write"))
        }
    }
}

impl RelTable for InMemoryRelTable {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn neighbors(&self, tx: &Transaction, node: NodeId, direction: Direction) -> Vec<(NodeId, RelId)> {
        let committed = self.committed.read();
        let mut result = match direction {
            Direction::Forward => committed.fwd_adj.get(&node).cloned().unwrap_or_default(),
            Direction::Backward => committed.bwd_adj.get(&node).cloned().unwrap_or_default(),
        };
        let overlays = self.overlays.read();
        if let Some(overlay) = overlays.get(&tx.id()) {
            let deleted_offsets: HashSet<u64> = overlay.deletes.clone();
            result.retain(|(_, rel_id)| !deleted_offsets.contains(&rel_id.offset));
            for (offset, entry) in &overlay.inserts {
                let rel_id = RelId::new(*offset, self.table_id);
                match direction {
                    Direction::Forward if entry.src == node => result.push((entry.dst, rel_id)),
                    Direction::Backward if entry.dst == node => result.push((entry.src, rel_id)),
                    _ => {}
                }
            }
        }
        result
    }

    fn get_property(&self, tx: &Transaction, rel_id: RelId, property: &str) -> Result<Value> {
        if rel_id.table_id != self.table_id {
            return Err(ExecError::runtime("rel id does not belong to this table"));
        }
        let overlays = self.overlays.read();
        if let Some(overlay) = overlays.get(&tx.id()) {
            if overlay.deletes.contains(&rel_id.offset) {
                return Err(ExecError::runtime("rel was deleted in this transaction"));
            }
            if let Some(entry) = overlay.inserts.get(&rel_id.offset) {
                let patched = overlay.updates.get(&rel_id.offset).and_then(|patch| patch.get(property));
                return Ok(patched.or_else(|| entry.properties.get(property)).cloned().unwrap_or(Value::Null));
            }
            if let Some(patch) = overlay.updates.get(&rel_id.offset) {
                if let Some(value) = patch.get(property) {
                    return Ok(value.clone());
                }
            }
        }
        self.committed
            .read()
            .rows
            .get(&rel_id.offset)
            .map(|entry| entry.properties.get(property).cloned().unwrap_or(Value::Null))
            .ok_or_else(|| ExecError::runtime("no such rel offset"))
    }

    fn insert(&self, tx: &Transaction, src: NodeId, dst: NodeId, properties: PropertyRow) -> Result<RelId> {
        Self::require_write(tx)?;
        let offset = self.next_offset.fetch_add(1, Ordering::AcqRel);
        let mut overlays = self.overlays.write();
        overlays
            .entry(tx.id())
            .or_default()
            .inserts
            .insert(offset, RelEntry { src, dst, properties });
        Ok(RelId::new(offset, self.table_id))
    }

    fn set_property(&self, tx: &Transaction, rel_id: RelId, property: &str, value: Value) -> Result<()> {
        Self::require_write(tx)?;
        if rel_id.table_id != self.table_id {
            return Err(ExecError::runtime("rel id does not belong to this table"));
        }
        let mut overlays = self.overlays.write();
        let overlay = overlays.entry(tx.id()).or_default();
        if let Some(entry) = overlay.inserts.get_mut(&rel_id.offset) {
            entry.properties.insert(property.to_string(), value);
        } else {
            overlay.updates.entry(rel_id.offset).or_default().insert(property.to_string(), value);
        }
        Ok(())
    }

    fn delete(&self, tx: &Transaction, rel_id: RelId) -> Result<()> {
        Self::require_write(tx)?;
        let mut overlays = self.overlays.write();
        let overlay = overlays.entry(tx.id()).or_default();
        overlay.inserts.remove(&rel_id.offset);
        overlay.updates.remove(&rel_id.offset);
        overlay.deletes.insert(rel_id.offset);
        Ok(())
    }

    fn commit(&self, tx: &Transaction) {
        let Some(overlay) = self.overlays.write().remove(&tx.id()) else {
            return;
        };
        debug!(
            table_id = self.table_id,
            tx_id = tx.id(),
            num_inserts = overlay.inserts.len(),
            num_updates = overlay.updates.len(),
            num_deletes = overlay.deletes.len(),
            "rel table overlay committed"
        );
        let mut committed = self.committed.write();
        for offset in overlay.deletes {
            if let Some(entry) = committed.rows.remove(&offset) {
                let rel_id = RelId::new(offset, self.table_id);
                if let Some(v) = committed.fwd_adj.get_mut(&entry.src) {
                    v.retain(|(_, r)| *r != rel_id);
                }
                if let Some(v) = committed.bwd_adj.get_mut(&entry.dst) {
                    v.retain(|(_, r)| *r != rel_id);
                }
            }
        }
        for (offset, entry) in overlay.inserts {
            let rel_id = RelId::new(offset, self.table_id);
            committed.fwd_adj.entry(entry.src).or_default().push((entry.dst, rel_id));
            committed.bwd_adj.entry(entry.dst).or_default().push((entry.src, rel_id));
            committed.rows.insert(offset, entry);
        }
        for (offset, patch) in overlay.updates {
            if let Some(entry) = committed.rows.get_mut(&offset) {
                entry.properties.extend(patch);
            }
        }
    }

    fn rollback(&self, tx: &Transaction) {
        self.overlays.write().remove(&tx.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionManager;
    use crate::TransactionMode;

    #[test]
    fn committed_insert_is_visible_via_both_directions() {
        let table = InMemoryRelTable::new(0);
        let manager = TransactionManager::new();
        let writer = manager.begin(TransactionMode::Write);
        let a = NodeId::new(0, 1);
        let b = NodeId::new(1, 1);
        let rel_id = table.insert(&writer, a, b, HashMap::new()).unwrap();
        table.commit(&writer);

        let reader = manager.begin(TransactionMode::ReadOnly);
        assert_eq!(table.neighbors(&reader, a, Direction::Forward), vec![(b, rel_id)]);
        assert_eq!(table.neighbors(&reader, b, Direction::Backward), vec![(a, rel_id)]);
        assert!(table.neighbors(&reader, b, Direction::Forward).is_empty());
    }

    #[test]
    fn delete_removes_rel_from_adjacency() {
        let table = InMemoryRelTable::new(0);
        let manager = TransactionManager::new();
        let writer = manager.begin(TransactionMode::Write);
        let a = NodeId::new(0, 1);
        let b = NodeId::new(1, 1);
        let rel_id = table.insert(&writer, a, b, HashMap::new()).unwrap();
        table.commit(&writer);

        let deleter = manager.begin(TransactionMode::Write);
        table.delete(&deleter, rel_id).unwrap();
        table.commit(&deleter);

        let reader = manager.begin(TransactionMode::ReadOnly);
        assert!(table.neighbors(&reader, a, Direction::Forward).is_empty());
    }

    #[test]
    fn set_property_is_visible_before_and_after_commit() {
        let table = InMemoryRelTable::new(0);
        let manager = TransactionManager::new();
        let writer = manager.begin(TransactionMode::Write);
        let a = NodeId::new(0, 1);
        let b = NodeId::new(1, 1);
        let rel_id = table.insert(&writer, a, b, HashMap::new()).unwrap();
        table.set_property(&writer, rel_id, "since", Value::Int64(2020)).unwrap();
        assert_eq!(table.get_property(&writer, rel_id, "since").unwrap(), Value::Int64(2020));
        table.commit(&writer);

        let reader = manager.begin(TransactionMode::ReadOnly);
        assert_eq!(table.get_property(&reader, rel_id, "since").unwrap(), Value::Int64(2020));
    }

    #[test]
    fn set_property_on_an_already_committed_rel_patches_in_place() {
        let table = InMemoryRelTable::new(0);
        let manager = TransactionManager::new();
        let writer = manager.begin(TransactionMode::Write);
        let a = NodeId::new(0, 1);
        let b = NodeId::new(1, 1);
        let rel_id = table.insert(&writer, a, b, HashMap::new()).unwrap();
        table.commit(&writer);

        let patcher = manager.begin(TransactionMode::Write);
        table.set_property(&patcher, rel_id, "since", Value::Int64(1999)).unwrap();
        table.commit(&patcher);

        let reader = manager.begin(TransactionMode::ReadOnly);
        assert_eq!(table.get_property(&reader, rel_id, "since").unwrap(), Value::Int64(1999));
    }

    proptest::proptest! {
        #[test]
        fn insert_then_commit_always_round_trips_the_property(since in 0i64..10_000) {
            let table = InMemoryRelTable::new(0);
            let manager = TransactionManager::new();
            let writer = manager.begin(TransactionMode::Write);
            let a = NodeId::new(0, 1);
            let b = NodeId::new(1, 1);
            let mut props = HashMap::new();
            props.insert("since".to_string(), Value::Int64(since));
            let rel_id = table.insert(&writer, a, b, props).unwrap();
            table.commit(&writer);

            let reader = manager.begin(TransactionMode::ReadOnly);
            proptest::prop_assert_eq!(table.get_property(&reader, rel_id, "since").unwrap(), Value::Int64(since));
        }
    }
}
