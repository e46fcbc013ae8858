//! Node tables: a transaction-local uncommitted overlay over a committed,
//! column-by-property store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;
use vgraph_error::{ExecError, Result};
use vgraph_types::{NodeId, TableId, Value};

use crate::transaction::Transaction;

type PropertyRow = HashMap<String, Value>;

#[derive(Default)]
struct Overlay {
    inserts: HashMap<u64, PropertyRow>,
    updates: HashMap<u64, PropertyRow>,
    deletes: HashSet<u64>,
}

#[derive(Default)]
struct Committed {
    rows: HashMap<u64, PropertyRow>,
    deleted: HashSet<u64>,
}

pub trait NodeTable: Send + Sync {
    fn table_id(&self) -> TableId;

    /// High-water mark for node offsets, including uncommitted inserts
    /// from any transaction (used to size scan morsels pessimistically).
    fn max_node_offset(&self) -> u64;

    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Runtime`] if `node_id` does not
    /// belong to this table or has been deleted.
    fn get_property(&self, tx: &Transaction, node_id: NodeId, property: &str) -> Result<Value>;

    fn scan_properties(
        &self,
        tx: &Transaction,
        start: u64,
        count: u64,
        properties: &[String],
    ) -> Result<Vec<(NodeId, Vec<Value>)>>;

    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Transaction`] if `tx` is
    /// read-only.
    fn insert(&self, tx: &Transaction, properties: PropertyRow) -> Result<NodeId>;

    fn set_property(&self, tx: &Transaction, node_id: NodeId, property: &str, value: Value) -> Result<()>;

    fn delete(&self, tx: &Transaction, node_id: NodeId) -> Result<()>;

    fn commit(&self, tx: &Transaction);

    fn rollback(&self, tx: &Transaction);
}

/// A process-local node table: committed rows behind one `RwLock`, and
/// one overlay per in-flight transaction. Offsets are reserved eagerly
/// (even before commit) so a `NodeId` handed back by `insert` stays valid
/// once the transaction commits.
pub struct InMemoryNodeTable {
    table_id: TableId,
    next_offset: AtomicU64,
    committed: RwLock<Committed>,
    overlays: RwLock<HashMap<u64, Overlay>>,
}

impl InMemoryNodeTable {
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

    fn with_overlay<R>(&self, tx_id: u64, f: impl FnOnce(&mut Overlay) -> R) -> R {
        let mut overlays = self.overlays.write();
        f(overlays.entry(tx_id).or_default())
    }
}

impl NodeTable for InMemoryNodeTable {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn max_node_offset(&self) -> u64 {
        self.next_offset.load(Ordering::Acquire)
    }

    fn get_property(&self, tx: &Transaction, node_id: NodeId, property: &str) -> Result<Value> {
        if node_id.table_id != self.table_id {
            return Err(ExecError::runtime("node id does not belong to this table"));
        }
        let overlays = self.overlays.read();
        if let Some(overlay) = overlays.get(&tx.id()) {
            if overlay.deletes.contains(&node_id.offset) {
                return Err(ExecError::runtime("node was deleted in this transaction"));
            }
            if let Some(row) = overlay.updates.get(&node_id.offset).or_else(|| overlay.inserts.get(&node_id.offset)) {
                return Ok(row.get(property).cloned().unwrap_or(Value::Null));
            }
        }
        let committed = self.committed.read();
        if committed.deleted.contains(&node_id.offset) {
            return Err(ExecError::runtime("node has been deleted"));
        }
        committed
            .rows
            .get(&node_id.offset)
            .map(|row| row.get(property).cloned().unwrap_or(Value::Null))
            .ok_or_else(|| ExecError::runtime("no such node offset"))
    }

    fn scan_properties(
        &self,
        tx: &Transaction,
        start: u64,
        count: u64,
        properties: &[String],
    ) -> Result<Vec<(NodeId, Vec<Value>)>> {
        let committed = self.committed.read();
        let overlays = self.overlays.read();
        let overlay = overlays.get(&tx.id());
        let mut out = Vec::with_capacity(count as usize);
        for offset in start..start.saturating_add(count) {
            if offset >= self.max_node_offset() {
                break;
            }
            if let Some(overlay) = overlay {
                if overlay.deletes.contains(&offset) {
                    continue;
                }
                if let Some(row) = overlay.updates.get(&offset).or_else(|| overlay.inserts.get(&offset)) {
                    let values = properties
                        .iter()
                        .map(|p| row.get(p).cloned().unwrap_or(Value::Null))
                        .collect();
                    out.push((NodeId::new(offset, self.table_id), values));
                    continue;
                }
            }
            if committed.deleted.contains(&offset) {
                continue;
            }
            if let Some(row) = committed.rows.get(&offset) {
                let values = properties
                    .iter()
                    .map(|p| row.get(p).cloned().unwrap_or(Value::Null))
                    .collect();
                out.push((NodeId::new(offset, self.table_id), values));
            }
        }
        Ok(out)
    }

    fn insert(&self, tx: &Transaction, properties: PropertyRow) -> Result<NodeId> {
        Self::require_write(tx)?;
        let offset = self.next_offset.fetch_add(1, Ordering::AcqRel);
        self.with_overlay(tx.id(), |overlay| overlay.inserts.insert(offset, properties));
        Ok(NodeId::new(offset, self.table_id))
    }

    fn set_property(&self, tx: &Transaction, node_id: NodeId, property: &str, value: Value) -> Result<()> {
        Self::require_write(tx)?;
        if node_id.table_id != self.table_id {
            return Err(ExecError::runtime("node id does not belong to this table"));
        }
        self.with_overlay(tx.id(), |overlay| {
            if let Some(row) = overlay.inserts.get_mut(&node_id.offset) {
                row.insert(property.to_string(), value);
            } else {
                overlay
                    .updates
                    .entry(node_id.offset)
                    .or_default()
                    .insert(property.to_string(), value);
            }
        });
        Ok(())
    }

    fn delete(&self, tx: &Transaction, node_id: NodeId) -> Result<()> {
        Self::require_write(tx)?;
        self.with_overlay(tx.id(), |overlay| {
            overlay.inserts.remove(&node_id.offset);
            overlay.updates.remove(&node_id.offset);
            overlay.deletes.insert(node_id.offset);
        });
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
            "node table overlay committed"
        );
        let mut committed = self.committed.write();
        for (offset, row) in overlay.inserts {
            committed.rows.insert(offset, row);
        }
        for (offset, patch) in overlay.updates {
            committed.rows.entry(offset).or_default().extend(patch);
        }
        for offset in overlay.deletes {
            committed.rows.remove(&offset);
            committed.deleted.insert(offset);
        }
    }

    fn rollback(&self, tx: &Transaction) {
        self.overlays.write().remove(&tx.id());
    }
}
