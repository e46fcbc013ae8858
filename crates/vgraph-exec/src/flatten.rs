//! `Flatten`: re-emits one selected position per call from a child whose
//! output chunk is unflat, so a consumer that can only process a single
//! row at a time (indexed writes, some scans) never has to special-case
//! a multi-row selection.

use vgraph_error::Result;
use vgraph_vector::{DataChunk, ResultSet};

use crate::context::QueryContext;
use crate::operator::PhysicalOperator;

/// Walks the active positions of `chunk_idx` in the child's output one at
/// a time, each call producing a result set whose `chunk_idx` chunk has
/// its own independent flat selection (not aliasing the child's shared
/// state) while every other chunk is passed through unchanged.
pub struct Flatten {
    child: Box<dyn PhysicalOperator>,
    chunk_idx: u32,
    positions: Vec<u32>,
    cursor: usize,
    output: ResultSet,
}

impl Flatten {
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>, chunk_idx: u32) -> Self {
        Self {
            child,
            chunk_idx,
            positions: Vec::new(),
            cursor: 0,
            output: ResultSet::new(Vec::new()),
        }
    }
}

impl PhysicalOperator for Flatten {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        loop {
            if self.cursor < self.positions.len() {
                let pos = self.positions[self.cursor];
                self.cursor += 1;
                let child_output = self.child.output();
                let mut chunks = child_output.chunks.clone();
                let mut flat_chunk = DataChunk::new(child_output.chunk(self.chunk_idx).vectors.clone());
                flat_chunk.set_state(vgraph_vector::SelectionState::flat_at(pos));
                chunks[self.chunk_idx as usize] = flat_chunk;
                self.output = ResultSet::new(chunks);
                return Ok(true);
            }
            if !self.child.get_next_tuple(ctx)? {
                return Ok(false);
            }
            self.positions = self.child.output().chunk(self.chunk_idx).state().lock().to_vec();
            self.cursor = 0;
        }
    }

    fn output(&self) -> &ResultSet {
        &self.output
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(self.child.clone_operator(), self.chunk_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgraph_types::{LogicalType, Value};
    use vgraph_vector::{SelectionState, ValueVector};

    struct OnceUnflat {
        output: ResultSet,
        done: bool,
    }

    impl OnceUnflat {
        fn new(values: &[i64]) -> Self {
            let vector = ValueVector::from_values(
                LogicalType::Int64,
                &values.iter().map(|v| Value::Int64(*v)).collect::<Vec<_>>(),
            )
            .unwrap();
            Self {
                output: ResultSet::new(vec![DataChunk::new(vec![vector])]),
                done: false,
            }
        }
    }

    impl PhysicalOperator for OnceUnflat {
        fn get_next_tuple(&mut self, _ctx: &QueryContext) -> Result<bool> {
            if self.done {
                return Ok(false);
            }
            self.done = true;
            Ok(true)
        }

        fn output(&self) -> &ResultSet {
            &self.output
        }

        fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
            unimplemented!("not exercised in this test")
        }

        fn is_source(&self) -> bool {
            true
        }
    }

    #[test]
    fn flatten_re_emits_one_row_per_unflat_position() {
        let child = Box::new(OnceUnflat::new(&[10, 20, 30]));
        let mut flatten = Flatten::new(child, 0);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());

        let mut seen = Vec::new();
        while flatten.get_next_tuple(&ctx).unwrap() {
            let chunk = flatten.output().chunk(0);
            assert!(chunk.is_flat());
            let state = chunk.state();
            let idx = state.lock().index_at(0);
            seen.push(chunk.vector(0).get(idx as usize));
        }
        assert_eq!(seen, vec![Value::Int64(10), Value::Int64(20), Value::Int64(30)]);
    }

    #[test]
    fn flatten_respects_an_already_filtered_selection() {
        let mut child = OnceUnflat::new(&[10, 20, 30]);
        child.output.chunk_mut(0).set_state(SelectionState::from_indices(vec![0, 2]));
        let mut flatten = Flatten::new(Box::new(child), 0);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());

        let mut seen = Vec::new();
        while flatten.get_next_tuple(&ctx).unwrap() {
            let chunk = flatten.output().chunk(0);
            let state = chunk.state();
            let idx = state.lock().index_at(0);
            seen.push(chunk.vector(0).get(idx as usize));
        }
        assert_eq!(seen, vec![Value::Int64(10), Value::Int64(30)]);
    }
}
