//! Table scans: `ScanNodeId` is the execution core's only source
//! operator, handing out node offsets morsel by morsel and honoring a
//! semi-mask when one has been wired in by a downstream join; the
//! property scans simply gather columns for whatever offsets their child
//! produced.

use std::sync::Arc;

use tracing::trace;
use vgraph_error::Result;
use vgraph_storage::NodeTable;
use vgraph_storage::Transaction;
use vgraph_types::{LogicalType, NodeId, Value};
use vgraph_vector::{DataChunk, ResultSet, ValueVector};

use crate::context::QueryContext;
use crate::operator::PhysicalOperator;
use crate::pipeline::MorselDispatcher;
use crate::semi_mask::SemiMask;

/// State shared by every cloned worker scanning the same table: the
/// morsel dispatcher and, optionally, the semi-mask fed by a downstream
/// join's build phase.
pub struct ScanNodeIdSharedState {
    dispatcher: MorselDispatcher,
    morsel_size: u64,
    mask: Option<Arc<SemiMask>>,
}

impl ScanNodeIdSharedState {
    #[must_use]
    pub fn new(max_offset: u64, morsel_size: u64, mask: Option<Arc<SemiMask>>) -> Self {
        Self {
            dispatcher: MorselDispatcher::new(max_offset),
            morsel_size,
            mask,
        }
    }
}

/// Source operator: scans one node table's offsets, honoring an
/// optional semi-mask, and emits them as a `NodeId` vector.
pub struct ScanNodeId {
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    shared: Arc<ScanNodeIdSharedState>,
    output: ResultSet,
}

impl ScanNodeId {
    #[must_use]
    pub fn new(table: Arc<dyn NodeTable>, tx: Arc<Transaction>, shared: Arc<ScanNodeIdSharedState>) -> Self {
        let output = ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
            LogicalType::Node,
            0,
        )])]);
        Self {
            table,
            tx,
            shared,
            output,
        }
    }

    fn next_live_morsel(&self) -> Option<(u64, u64)> {
        loop {
            let morsel = self.shared.dispatcher.next_morsel(self.shared.morsel_size)?;
            if let Some(mask) = &self.shared.mask {
                let morsel_idx = (morsel.start / self.shared.morsel_size) as usize;
                if !mask.morsel_has_any_live(morsel_idx) {
                    continue;
                }
            }
            return Some((morsel.start, morsel.end));
        }
    }
}

impl PhysicalOperator for ScanNodeId {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        loop {
            let Some((start, end)) = self.next_live_morsel() else {
                return Ok(false);
            };
            let mut offsets = Vec::new();
            for offset in start..end {
                let survives = self.shared.mask.as_ref().is_none_or(|mask| mask.is_masked(offset as usize));
                if survives {
                    offsets.push(offset);
                }
            }
            if offsets.is_empty() {
                continue;
            }
            trace!(table_id = self.table.table_id(), start, end, num_rows = offsets.len(), "node scan morsel");
            let node_ids: Vec<Value> = offsets
                .iter()
                .map(|&offset| Value::Node(NodeId::new(offset, self.table.table_id())))
                .collect();
            let vector = ValueVector::from_values(LogicalType::Node, &node_ids)?;
            self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
            return Ok(true);
        }
    }

    fn output(&self) -> &ResultSet {
        &self.output
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(Arc::clone(&self.table), Arc::clone(&self.tx), Arc::clone(&self.shared)))
    }

    fn is_source(&self) -> bool {
        true
    }
}

/// Gathers one or more properties for the `NodeId`s in its child's output
/// vector at `input_vector_idx`.
pub struct ScanNodeProperty {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    input_vector_idx: u32,
    properties: Vec<String>,
    output: ResultSet,
}

impl ScanNodeProperty {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn NodeTable>,
        tx: Arc<Transaction>,
        input_vector_idx: u32,
        properties: Vec<String>,
    ) -> Self {
        let types: Vec<LogicalType> = properties.iter().map(|_| LogicalType::String).collect();
        let vectors = types
            .into_iter()
            .map(|t| ValueVector::with_capacity(t, 0))
            .collect();
        Self {
            child,
            table,
            tx,
            input_vector_idx,
            properties,
            output: ResultSet::new(vec![DataChunk::new(vectors)]),
        }
    }
}

impl PhysicalOperator for ScanNodeProperty {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let id_vector = input.chunk(0).vector(self.input_vector_idx as usize);
        let num_rows = input.chunk(0).num_rows();
        let mut columns: Vec<Vec<Value>> = self.properties.iter().map(|_| Vec::with_capacity(num_rows)).collect();
        for pos in input.chunk(0).state().lock().iter() {
            let Value::Node(node_id) = id_vector.get(pos as usize) else {
                continue;
            };
            for (col, property) in self.properties.iter().enumerate() {
                columns[col].push(self.table.get_property(&self.tx, node_id, property)?);
            }
        }
        let vectors: Result<Vec<ValueVector>> = self
            .properties
            .iter()
            .zip(columns)
            .map(|(_, values)| ValueVector::from_values(infer_type(&values), &values))
            .collect();
        self.output = ResultSet::new(vec![DataChunk::new(vectors?)]);
        Ok(true)
    }

    fn output(&self) -> &ResultSet {
        &self.output
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(
            self.child.clone_operator(),
            Arc::clone(&self.table),
            Arc::clone(&self.tx),
            self.input_vector_idx,
            self.properties.clone(),
        ))
    }
}

fn infer_type(values: &[Value]) -> LogicalType {
    values
        .iter()
        .find(|v| !v.is_null())
        .map_or(LogicalType::String, |v| match v {
            Value::Bool(_) => LogicalType::Bool,
            Value::Int16(_) => LogicalType::Int16,
            Value::Int32(_) => LogicalType::Int32,
            Value::Int64(_) => LogicalType::Int64,
            Value::Float(_) => LogicalType::Float,
            Value::Double(_) => LogicalType::Double,
            Value::Date(_) => LogicalType::Date,
            Value::Timestamp(_) => LogicalType::Timestamp,
            Value::Blob(_) => LogicalType::Blob,
            Value::Node(_) => LogicalType::Node,
            Value::Rel(_) => LogicalType::Rel,
            _ => LogicalType::String,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgraph_storage::{InMemoryNodeTable, TransactionManager, TransactionMode};

    fn seeded_table(n: u64) -> (Arc<dyn NodeTable>, Arc<Transaction>) {
        let table = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let writer = manager.begin(TransactionMode::Write);
        for i in 0..n {
            let mut props = std::collections::HashMap::new();
            props.insert("name".to_string(), Value::String(format!("n{i}")));
            table.insert(&writer, props).unwrap();
        }
        table.commit(&writer);
        (table, Arc::new(writer))
    }

    #[test]
    fn scan_covers_every_offset_exactly_once() {
        let (table, tx) = seeded_table(23);
        let shared = Arc::new(ScanNodeIdSharedState::new(23, 5, None));
        let mut scan = ScanNodeId::new(Arc::clone(&table), Arc::clone(&tx), shared);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        let mut seen = Vec::new();
        while scan.get_next_tuple(&ctx).unwrap() {
            let vector = scan.output().chunk(0).vector(0);
            for pos in scan.output().chunk(0).state().lock().iter() {
                if let Value::Node(id) = vector.get(pos as usize) {
                    seen.push(id.offset);
                }
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn semi_mask_filters_out_unmasked_offsets() {
        let (table, tx) = seeded_table(10);
        let mask = Arc::new(SemiMask::new(10, 4));
        let masker_idx = mask.register_masker();
        mask.mark(2, masker_idx);
        mask.mark(7, masker_idx);
        let shared = Arc::new(ScanNodeIdSharedState::new(10, 4, Some(mask)));
        let mut scan = ScanNodeId::new(table, tx, shared);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        let mut seen = Vec::new();
        while scan.get_next_tuple(&ctx).unwrap() {
            let vector = scan.output().chunk(0).vector(0);
            for pos in scan.output().chunk(0).state().lock().iter() {
                if let Value::Node(id) = vector.get(pos as usize) {
                    seen.push(id.offset);
                }
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![2, 7]);
    }
}
