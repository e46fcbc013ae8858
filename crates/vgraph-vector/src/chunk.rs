//! Data chunks and result sets: the unit of data an operator pulls from
//! its child and pushes to its parent.

use std::sync::Arc;

use parking_lot::Mutex;

use vgraph_types::DataPos;

use crate::selection::SelectionState;
use crate::vector::ValueVector;

/// A group of value vectors that share one selection state.
///
/// All vectors in a chunk always have the same logical row count and are
/// indexed through the same selection, so a predicate evaluated against
/// one vector narrows every vector in the chunk simultaneously. The
/// selection is shared rather than copied because several chunks in a
/// result set (e.g. a scan's key chunk and payload chunk) typically share
/// one selection; it is `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>` so a
/// `DataChunk`, and the operators that hold one, stay `Send` across the
/// worker threads a pipeline schedules them onto.
#[derive(Clone)]
pub struct DataChunk {
    pub vectors: Vec<ValueVector>,
    state: Arc<Mutex<SelectionState>>,
}

impl DataChunk {
    #[must_use]
    pub fn new(vectors: Vec<ValueVector>) -> Self {
        let len = vectors.first().map_or(0, ValueVector::len);
        Self {
            vectors,
            state: Arc::new(Mutex::new(SelectionState::unfiltered(len))),
        }
    }

    /// A chunk that shares its selection state with `other`, used when a
    /// scan or join produces several parallel chunks for one result set.
    #[must_use]
    pub fn with_shared_state(vectors: Vec<ValueVector>, other: &Self) -> Self {
        Self {
            vectors,
            state: Arc::clone(&other.state),
        }
    }

    #[must_use]
    pub fn state(&self) -> Arc<Mutex<SelectionState>> {
        Arc::clone(&self.state)
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.state.lock().len()
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.state.lock().is_flat()
    }

    pub fn set_state(&mut self, state: SelectionState) {
        *self.state.lock() = state;
    }

    #[must_use]
    pub fn vector(&self, idx: usize) -> &ValueVector {
        &self.vectors[idx]
    }

    #[must_use]
    pub fn vector_mut(&mut self, idx: usize) -> &mut ValueVector {
        &mut self.vectors[idx]
    }
}

/// The operator-to-operator handoff unit: an ordered list of data chunks,
/// addressed by operators via [`DataPos`] rather than direct references so
/// a cloned operator can re-resolve positions against its own result set.
#[derive(Clone)]
pub struct ResultSet {
    pub chunks: Vec<DataChunk>,
}

impl ResultSet {
    #[must_use]
    pub fn new(chunks: Vec<DataChunk>) -> Self {
        Self { chunks }
    }

    #[must_use]
    pub fn chunk(&self, idx: u32) -> &DataChunk {
        &self.chunks[idx as usize]
    }

    #[must_use]
    pub fn chunk_mut(&mut self, idx: u32) -> &mut DataChunk {
        &mut self.chunks[idx as usize]
    }

    #[must_use]
    pub fn vector_at(&self, pos: DataPos) -> &ValueVector {
        self.chunk(pos.chunk_idx).vector(pos.vector_idx as usize)
    }

    #[must_use]
    pub fn vector_at_mut(&mut self, pos: DataPos) -> &mut ValueVector {
        self.chunk_mut(pos.chunk_idx)
            .vector_mut(pos.vector_idx as usize)
    }

    /// Number of selected rows in the chunk addressed by `chunk_idx`, used
    /// by operators that only need the row count (e.g. an aggregate
    /// counting input rows without reading any vector).
    #[must_use]
    pub fn num_rows_in(&self, chunk_idx: u32) -> usize {
        self.chunk(chunk_idx).num_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgraph_types::{LogicalType, Value};

    fn int_vector(values: &[i64]) -> ValueVector {
        ValueVector::from_values(
            LogicalType::Int64,
            &values.iter().map(|v| Value::Int64(*v)).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn shared_state_is_seen_by_both_chunks() {
        let a = DataChunk::new(vec![int_vector(&[1, 2, 3])]);
        let b = DataChunk::with_shared_state(vec![int_vector(&[10, 20, 30])], &a);
        *a.state().lock() = SelectionState::from_indices(vec![1]);
        assert_eq!(b.num_rows(), 1);
    }

    #[test]
    fn result_set_addresses_vectors_by_data_position() {
        let chunk = DataChunk::new(vec![int_vector(&[7, 8])]);
        let rs = ResultSet::new(vec![chunk]);
        let pos = DataPos::new(0, 0);
        assert_eq!(rs.vector_at(pos).get(1), Value::Int64(8));
    }
}
