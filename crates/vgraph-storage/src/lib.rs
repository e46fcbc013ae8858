//! Storage-layer contracts used by the execution core, plus in-memory
//! reference implementations sufficient to exercise it end to end.
//!
//! None of these types reimplement a real pager, B-tree, or write-ahead
//! log on disk — persistence and page formats are out of scope here. What
//! they preserve is the *shape* of the collaboration: node/relationship
//! tables with a transaction-local uncommitted overlay, a catalog that
//! assigns stable table identifiers, a buffer manager that tracks pin
//! counts, and a WAL that records the operations a real one would flush.

pub mod buffer_manager;
pub mod catalog;
pub mod memory_manager;
pub mod node_table;
pub mod rel_table;
pub mod transaction;
pub mod wal;

pub use buffer_manager::{BufferManager, InMemoryBufferManager, PageHandle};
pub use catalog::{Catalog, InMemoryCatalog, NodeTableSchema, RelTableSchema};
pub use memory_manager::{InMemoryMemoryManager, MemoryHandle, MemoryManager};
pub use node_table::{InMemoryNodeTable, NodeTable};
pub use rel_table::{Direction, InMemoryRelTable, RelTable};
pub use transaction::{Transaction, TransactionManager, TransactionMode};
pub use wal::{InMemoryWal, Wal, WalRecord};
