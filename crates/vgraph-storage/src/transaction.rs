//! Transactions: an identifier, a read/write mode, and nothing else — the
//! tables themselves own each transaction's uncommitted overlay, keyed by
//! this identifier.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    Write,
}

pub struct Transaction {
    id: u64,
    mode: TransactionMode,
    active: AtomicBool,
}

impl Transaction {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn mode(&self) -> TransactionMode {
        self.mode
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self.mode, TransactionMode::Write)
    }

    fn close(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Issues monotonically increasing transaction identifiers. Commit and
/// rollback are driven externally (by whoever coordinates the tables
/// touched by the transaction, typically the query runner); this type
/// only hands out the identifier and tracks liveness.
#[derive(Default)]
pub struct TransactionManager {
    next_id: AtomicU64,
}

impl TransactionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn begin(&self, mode: TransactionMode) -> Transaction {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(tx_id = id, ?mode, "transaction begin");
        Transaction {
            id,
            mode,
            active: AtomicBool::new(true),
        }
    }

    pub fn end(&self, tx: &Transaction) {
        debug!(tx_id = tx.id, "transaction end");
        tx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_unique_and_increasing() {
        let manager = TransactionManager::new();
        let a = manager.begin(TransactionMode::Write);
        let b = manager.begin(TransactionMode::ReadOnly);
        assert!(b.id() > a.id());
        assert!(a.is_write());
        assert!(!b.is_write());
    }

    #[test]
    fn ending_a_transaction_marks_it_inactive() {
        let manager = TransactionManager::new();
        let tx = manager.begin(TransactionMode::Write);
        assert!(tx.is_active());
        manager.end(&tx);
        assert!(!tx.is_active());
    }
}
