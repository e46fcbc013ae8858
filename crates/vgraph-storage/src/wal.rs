//! Write-ahead log contract: an append-only record of the mutations a
//! transaction made, used for crash recovery in a real engine. This
//! in-memory recorder keeps the records in a `Vec` for test introspection
//! rather than flushing them anywhere durable.

use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    PageUpdate { table_id: u32, page_id: u64 },
    Commit { tx_id: u64 },
    SchemaChange { description: String },
}

pub trait Wal: Send + Sync {
    fn log_page_update(&self, table_id: u32, page_id: u64);
    fn log_commit(&self, tx_id: u64);
    fn log_schema_change(&self, description: &str);
    fn records(&self) -> Vec<WalRecord>;
}

#[derive(Default)]
pub struct InMemoryWal {
    records: Mutex<Vec<WalRecord>>,
}

impl InMemoryWal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Wal for InMemoryWal {
    fn log_page_update(&self, table_id: u32, page_id: u64) {
        trace!(table_id, page_id, "wal page update record");
        self.records.lock().push(WalRecord::PageUpdate { table_id, page_id });
    }

    fn log_commit(&self, tx_id: u64) {
        trace!(tx_id, "wal commit record");
        self.records.lock().push(WalRecord::Commit { tx_id });
    }

    fn log_schema_change(&self, description: &str) {
        trace!(description, "wal schema change record");
        self.records.lock().push(WalRecord::SchemaChange {
            description: description.to_string(),
        });
    }

    fn records(&self) -> Vec<WalRecord> {
        self.records.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_kept_in_order() {
        let wal = InMemoryWal::new();
        wal.log_page_update(1, 10);
        wal.log_commit(7);
        assert_eq!(
            wal.records(),
            vec![
                WalRecord::PageUpdate { table_id: 1, page_id: 10 },
                WalRecord::Commit { tx_id: 7 },
            ]
        );
    }
}
