//! Vectorized data model: value vectors, selection state, data chunks,
//! factorized tables, and the build-side hash table.

pub mod chunk;
pub mod factorized;
pub mod hash;
pub mod metrics;
pub mod null_bitmap;
pub mod selection;
pub mod vector;

pub use chunk::{DataChunk, ResultSet};
pub use factorized::{ColumnDescriptor, FactorizedTable, OverflowValue, TableSchema};
pub use hash::{capacity_for, combine_hash, hash_key, hash_value, murmur_finalizer, HashTable, NULL_HASH};
pub use metrics::VectorMetrics;
pub use null_bitmap::NullBitmap;
pub use selection::SelectionState;
pub use vector::{ListEntry, ValueVector, VectorData};
