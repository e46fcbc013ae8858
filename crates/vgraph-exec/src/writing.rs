//! Writing operators: `CreateNode`, `CreateRel`, `SetNodeProperty`,
//! `SetRelProperty`, `DeleteNode`, `DeleteRel`, `Merge`, `CopyNode`,
//! `CopyRel`. The row-at-a-time operators are each driven by a small
//! per-row state machine so a constraint failure on row 5 doesn't leave
//! rows 1-4 half-applied with no record of what happened. `CopyNode`/
//! `CopyRel` instead apply a whole input chunk per call, matching a bulk
//! loader rather than an indexed single-row write.

use std::sync::Arc;

use tracing::debug;
use vgraph_error::{ExecError, Result};
use vgraph_storage::{NodeTable, RelTable, Transaction, Wal};
use vgraph_types::{LogicalType, NodeId, RelId, Value};
use vgraph_vector::{DataChunk, ResultSet, ValueVector};

use crate::context::QueryContext;
use crate::operator::PhysicalOperator;

/// One row's progress through a writing operator. `Error` is terminal:
/// once a row fails validation the operator surfaces the error instead
/// of silently skipping the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    ReadInput,
    Validate,
    Apply,
    EmitOutput,
}

/// Creates one node per input row (or, with no child, exactly one node
/// per call), enforcing an optional primary-key property's uniqueness
/// before applying.
pub struct CreateNode {
    child: Option<Box<dyn PhysicalOperator>>,
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    primary_key: Option<String>,
    pending_properties: Vec<(String, Value)>,
    emitted_once: bool,
    output: ResultSet,
}

impl CreateNode {
    #[must_use]
    pub fn new(
        child: Option<Box<dyn PhysicalOperator>>,
        table: Arc<dyn NodeTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        primary_key: Option<String>,
        literal_properties: Vec<(String, Value)>,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            primary_key,
            pending_properties: literal_properties,
            emitted_once: false,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Node,
                0,
            )])]),
        }
    }

    fn validate_unique(&self) -> Result<()> {
        let Some(key) = &self.primary_key else {
            return Ok(());
        };
        let value = self
            .pending_properties
            .iter()
            .find(|(k, _)| k == key)
            .map_or(Value::Null, |(_, v)| v.clone());
        let existing = self
            .table
            .scan_properties(&self.tx, 0, self.table.max_node_offset(), std::slice::from_ref(key))?;
        if existing.iter().any(|(_, values)| values.first() == Some(&value)) {
            return Err(ExecError::constraint_violation(format!(
                "duplicate value for primary key {key}"
            )));
        }
        Ok(())
    }
}

impl PhysicalOperator for CreateNode {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        let mut state = WriteState::ReadInput;
        loop {
            state = match state {
                WriteState::ReadInput => {
                    match &mut self.child {
                        Some(child) => {
                            if !child.get_next_tuple(ctx)? {
                                return Ok(false);
                            }
                        }
                        None => {
                            if self.emitted_once {
                                return Ok(false);
                            }
                        }
                    }
                    WriteState::Validate
                }
                WriteState::Validate => {
                    self.validate_unique()?;
                    WriteState::Apply
                }
                WriteState::Apply => {
                    let properties = self.pending_properties.iter().cloned().collect();
                    let node_id = self.table.insert(&self.tx, properties)?;
                    self.wal.log_page_update(node_id.table_id, node_id.offset / 64);
                    debug!(table_id = node_id.table_id, offset = node_id.offset, "node created");
                    self.emitted_once = true;
                    let vector = ValueVector::from_values(LogicalType::Node, &[Value::Node(node_id)])?;
                    self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
                    WriteState::EmitOutput
                }
                WriteState::EmitOutput => return Ok(true),
            };
        }
    }

    fn output(&self) -> &ResultSet {
        &self.output
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(
            self.child.as_ref().map(|c| c.clone_operator()),
            Arc::clone(&self.table),
            Arc::clone(&self.tx),
            Arc::clone(&self.wal),
            self.primary_key.clone(),
            self.pending_properties.clone(),
        ))
    }

    fn is_source(&self) -> bool {
        self.child.is_none()
    }
}

/// Sets one property on every node id produced by `child`.
pub struct SetNodeProperty {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    input_vector_idx: u32,
    property: String,
    value: Value,
    output: ResultSet,
}

impl SetNodeProperty {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn NodeTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        input_vector_idx: u32,
        property: String,
        value: Value,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            input_vector_idx,
            property,
            value,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Node,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for SetNodeProperty {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let id_vector = input.chunk(0).vector(self.input_vector_idx as usize);
        let mut updated = Vec::new();
        for pos in input.chunk(0).state().lock().iter() {
            let Value::Node(node_id) = id_vector.get(pos as usize) else {
                continue;
            };
            self.table
                .set_property(&self.tx, node_id, &self.property, self.value.clone())?;
            self.wal.log_page_update(node_id.table_id, node_id.offset / 64);
            debug!(table_id = node_id.table_id, offset = node_id.offset, property = %self.property, "node property set");
            updated.push(Value::Node(node_id));
        }
        let vector = ValueVector::from_values(LogicalType::Node, &updated)?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
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
            Arc::clone(&self.wal),
            self.input_vector_idx,
            self.property.clone(),
            self.value.clone(),
        ))
    }
}

/// Deletes every node id produced by `child`.
pub struct DeleteNode {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    input_vector_idx: u32,
    output: ResultSet,
}

impl DeleteNode {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn NodeTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        input_vector_idx: u32,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            input_vector_idx,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Int64,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for DeleteNode {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let id_vector = input.chunk(0).vector(self.input_vector_idx as usize);
        let mut count = 0i64;
        for pos in input.chunk(0).state().lock().iter() {
            let Value::Node(node_id) = id_vector.get(pos as usize) else {
                continue;
            };
            self.table.delete(&self.tx, node_id)?;
            self.wal.log_page_update(node_id.table_id, node_id.offset / 64);
            count += 1;
        }
        debug!(count, "nodes deleted");
        let vector = ValueVector::from_values(LogicalType::Int64, &[Value::Int64(count)])?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
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
            Arc::clone(&self.wal),
            self.input_vector_idx,
        ))
    }
}

/// Creates one relationship between `src` and `dst` per call.
pub struct CreateRel {
    table: Arc<dyn RelTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    src: NodeId,
    dst: NodeId,
    properties: Vec<(String, Value)>,
    emitted_once: bool,
    output: ResultSet,
}

impl CreateRel {
    #[must_use]
    pub fn new(
        table: Arc<dyn RelTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        src: NodeId,
        dst: NodeId,
        properties: Vec<(String, Value)>,
    ) -> Self {
        Self {
            table,
            tx,
            wal,
            src,
            dst,
            properties,
            emitted_once: false,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Rel,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for CreateRel {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if self.emitted_once {
            return Ok(false);
        }
        let rel_id = self
            .table
            .insert(&self.tx, self.src, self.dst, self.properties.iter().cloned().collect())?;
        self.wal.log_page_update(rel_id.table_id, rel_id.offset / 64);
        debug!(table_id = rel_id.table_id, offset = rel_id.offset, "rel created");
        self.emitted_once = true;
        let vector = ValueVector::from_values(LogicalType::Rel, &[Value::Rel(rel_id)])?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
        Ok(true)
    }

    fn output(&self) -> &ResultSet {
        &self.output
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(
            Arc::clone(&self.table),
            Arc::clone(&self.tx),
            Arc::clone(&self.wal),
            self.src,
            self.dst,
            self.properties.clone(),
        ))
    }

    fn is_source(&self) -> bool {
        true
    }
}

/// Sets one property on every rel id produced by `child`.
pub struct SetRelProperty {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn RelTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    input_vector_idx: u32,
    property: String,
    value: Value,
    output: ResultSet,
}

impl SetRelProperty {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn RelTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        input_vector_idx: u32,
        property: String,
        value: Value,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            input_vector_idx,
            property,
            value,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Rel,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for SetRelProperty {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let id_vector = input.chunk(0).vector(self.input_vector_idx as usize);
        let mut updated = Vec::new();
        for pos in input.chunk(0).state().lock().iter() {
            let Value::Rel(rel_id) = id_vector.get(pos as usize) else {
                continue;
            };
            self.table
                .set_property(&self.tx, rel_id, &self.property, self.value.clone())?;
            self.wal.log_page_update(rel_id.table_id, rel_id.offset / 64);
            debug!(table_id = rel_id.table_id, offset = rel_id.offset, property = %self.property, "rel property set");
            updated.push(Value::Rel(rel_id));
        }
        let vector = ValueVector::from_values(LogicalType::Rel, &updated)?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
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
            Arc::clone(&self.wal),
            self.input_vector_idx,
            self.property.clone(),
            self.value.clone(),
        ))
    }
}

/// Deletes every rel id produced by `child`.
pub struct DeleteRel {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn RelTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    input_vector_idx: u32,
    output: ResultSet,
}

impl DeleteRel {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn RelTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        input_vector_idx: u32,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            input_vector_idx,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Int64,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for DeleteRel {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let id_vector = input.chunk(0).vector(self.input_vector_idx as usize);
        let mut count = 0i64;
        for pos in input.chunk(0).state().lock().iter() {
            let Value::Rel(rel_id) = id_vector.get(pos as usize) else {
                continue;
            };
            self.table.delete(&self.tx, rel_id)?;
            self.wal.log_page_update(rel_id.table_id, rel_id.offset / 64);
            count += 1;
        }
        debug!(count, "rels deleted");
        let vector = ValueVector::from_values(LogicalType::Int64, &[Value::Int64(count)])?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
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
            Arc::clone(&self.wal),
            self.input_vector_idx,
        ))
    }
}

/// `MERGE`: given a flat input row carrying a mark (whether an upstream
/// match was found) and, when matched, the matched node's id, either
/// applies the ON MATCH properties to that node or creates a fresh one
/// with the ON CREATE properties — never both, mirroring the planner's
/// single mark-driven branch rather than two separate plan subtrees.
pub struct Merge {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    mark_vector_idx: u32,
    matched_node_vector_idx: u32,
    on_create_properties: Vec<(String, Value)>,
    on_match_properties: Vec<(String, Value)>,
    output: ResultSet,
}

impl Merge {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn NodeTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        mark_vector_idx: u32,
        matched_node_vector_idx: u32,
        on_create_properties: Vec<(String, Value)>,
        on_match_properties: Vec<(String, Value)>,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            mark_vector_idx,
            matched_node_vector_idx,
            on_create_properties,
            on_match_properties,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Node,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for Merge {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        let mut state = WriteState::ReadInput;
        loop {
            state = match state {
                WriteState::ReadInput => {
                    if !self.child.get_next_tuple(ctx)? {
                        return Ok(false);
                    }
                    WriteState::Validate
                }
                WriteState::Validate => WriteState::Apply,
                WriteState::Apply => {
                    let input = self.child.output();
                    let chunk = input.chunk(0);
                    let pos = chunk.state().lock().index_at(0);
                    let matched = chunk.vector(self.mark_vector_idx as usize).get(pos as usize) == Value::Bool(true);
                    let node_id = if matched {
                        let Value::Node(node_id) = chunk.vector(self.matched_node_vector_idx as usize).get(pos as usize)
                        else {
                            return Err(ExecError::runtime("merge mark true but no matched node id present"));
                        };
                        for (property, value) in &self.on_match_properties {
                            self.table.set_property(&self.tx, node_id, property, value.clone())?;
                        }
                        debug!(table_id = node_id.table_id, offset = node_id.offset, "merge matched existing node");
                        node_id
                    } else {
                        let properties = self.on_create_properties.iter().cloned().collect();
                        let node_id = self.table.insert(&self.tx, properties)?;
                        debug!(table_id = node_id.table_id, offset = node_id.offset, "merge created new node");
                        node_id
                    };
                    self.wal.log_page_update(node_id.table_id, node_id.offset / 64);
                    let vector = ValueVector::from_values(LogicalType::Node, &[Value::Node(node_id)])?;
                    self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
                    WriteState::EmitOutput
                }
                WriteState::EmitOutput => return Ok(true),
            };
        }
    }

    fn output(&self) -> &ResultSet {
        &self.output
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(
            self.child.clone_operator(),
            Arc::clone(&self.table),
            Arc::clone(&self.tx),
            Arc::clone(&self.wal),
            self.mark_vector_idx,
            self.matched_node_vector_idx,
            self.on_create_properties.clone(),
            self.on_match_properties.clone(),
        ))
    }
}

/// Bulk node loader: unlike `CreateNode`, applies a whole input chunk per
/// call rather than walking a per-row state machine, matching a COPY
/// statement's vectored ingestion rather than an indexed write.
pub struct CopyNode {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn NodeTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    property_vector_indices: Vec<u32>,
    property_names: Vec<String>,
    rows_copied: i64,
    output: ResultSet,
}

impl CopyNode {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn NodeTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        property_vector_indices: Vec<u32>,
        property_names: Vec<String>,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            property_vector_indices,
            property_names,
            rows_copied: 0,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Int64,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for CopyNode {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let chunk = input.chunk(0);
        let mut batch_count = 0i64;
        for pos in chunk.state().lock().iter() {
            let properties = self
                .property_names
                .iter()
                .cloned()
                .zip(
                    self.property_vector_indices
                        .iter()
                        .map(|&idx| chunk.vector(idx as usize).get(pos as usize)),
                )
                .collect();
            let node_id = self.table.insert(&self.tx, properties)?;
            self.wal.log_page_update(node_id.table_id, node_id.offset / 64);
            batch_count += 1;
        }
        self.rows_copied += batch_count;
        debug!(rows_in_batch = batch_count, total_rows_copied = self.rows_copied, "copy node batch applied");
        let vector = ValueVector::from_values(LogicalType::Int64, &[Value::Int64(self.rows_copied)])?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
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
            Arc::clone(&self.wal),
            self.property_vector_indices.clone(),
            self.property_names.clone(),
        ))
    }
}

/// Bulk rel loader: reads `(src, dst)` node-id vectors plus property
/// vectors from `child` and inserts one rel per active row per call.
pub struct CopyRel {
    child: Box<dyn PhysicalOperator>,
    table: Arc<dyn RelTable>,
    tx: Arc<Transaction>,
    wal: Arc<dyn Wal>,
    src_vector_idx: u32,
    dst_vector_idx: u32,
    property_vector_indices: Vec<u32>,
    property_names: Vec<String>,
    rows_copied: i64,
    output: ResultSet,
}

impl CopyRel {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        table: Arc<dyn RelTable>,
        tx: Arc<Transaction>,
        wal: Arc<dyn Wal>,
        src_vector_idx: u32,
        dst_vector_idx: u32,
        property_vector_indices: Vec<u32>,
        property_names: Vec<String>,
    ) -> Self {
        Self {
            child,
            table,
            tx,
            wal,
            src_vector_idx,
            dst_vector_idx,
            property_vector_indices,
            property_names,
            rows_copied: 0,
            output: ResultSet::new(vec![DataChunk::new(vec![ValueVector::with_capacity(
                LogicalType::Int64,
                0,
            )])]),
        }
    }
}

impl PhysicalOperator for CopyRel {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let input = self.child.output();
        let chunk = input.chunk(0);
        let mut batch_count = 0i64;
        for pos in chunk.state().lock().iter() {
            let Value::Node(src) = chunk.vector(self.src_vector_idx as usize).get(pos as usize) else {
                continue;
            };
            let Value::Node(dst) = chunk.vector(self.dst_vector_idx as usize).get(pos as usize) else {
                continue;
            };
            let properties = self
                .property_names
                .iter()
                .cloned()
                .zip(
                    self.property_vector_indices
                        .iter()
                        .map(|&idx| chunk.vector(idx as usize).get(pos as usize)),
                )
                .collect();
            let rel_id: RelId = self.table.insert(&self.tx, src, dst, properties)?;
            self.wal.log_page_update(rel_id.table_id, rel_id.offset / 64);
            batch_count += 1;
        }
        self.rows_copied += batch_count;
        debug!(rows_in_batch = batch_count, total_rows_copied = self.rows_copied, "copy rel batch applied");
        let vector = ValueVector::from_values(LogicalType::Int64, &[Value::Int64(self.rows_copied)])?;
        self.output = ResultSet::new(vec![DataChunk::new(vec![vector])]);
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
            Arc::clone(&self.wal),
            self.src_vector_idx,
            self.dst_vector_idx,
            self.property_vector_indices.clone(),
            self.property_names.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vgraph_storage::{InMemoryNodeTable, InMemoryWal, TransactionManager, TransactionMode};

    #[test]
    fn create_node_emits_a_fresh_node_id() {
        let table: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut op = CreateNode::new(None, table, tx, wal, None, vec![("name".into(), Value::String("a".into()))]);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(op.get_next_tuple(&ctx).unwrap());
        assert!(!op.get_next_tuple(&ctx).unwrap());
    }

    #[test]
    fn duplicate_primary_key_is_a_constraint_violation() {
        let table: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());

        let mut first = CreateNode::new(
            None,
            Arc::clone(&table),
            Arc::clone(&tx),
            Arc::clone(&wal),
            Some("id".into()),
            vec![("id".into(), Value::Int64(1))],
        );
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(first.get_next_tuple(&ctx).unwrap());
        table.commit(&tx);

        let mut second = CreateNode::new(
            None,
            table,
            tx,
            wal,
            Some("id".into()),
            vec![("id".into(), Value::Int64(1))],
        );
        let err = second.get_next_tuple(&ctx).unwrap_err();
        assert!(matches!(err.kind, vgraph_error::ErrorKind::ConstraintViolation));
    }

    #[test]
    fn delete_node_reports_rows_deleted() {
        let table: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));
        let node_id = table.insert(&tx, HashMap::new()).unwrap();
        table.commit(&tx);

        struct OneRow(ResultSet, bool);
        impl PhysicalOperator for OneRow {
            fn get_next_tuple(&mut self, _ctx: &QueryContext) -> Result<bool> {
                if self.1 {
                    return Ok(false);
                }
                self.1 = true;
                Ok(true)
            }
            fn output(&self) -> &ResultSet {
                &self.0
            }
            fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
                unimplemented!()
            }
            fn is_source(&self) -> bool {
                true
            }
        }
        let vector = ValueVector::from_values(LogicalType::Node, &[Value::Node(node_id)]).unwrap();
        let source = OneRow(ResultSet::new(vec![DataChunk::new(vec![vector])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut delete = DeleteNode::new(Box::new(source), table, tx, wal, 0);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(delete.get_next_tuple(&ctx).unwrap());
        let out = delete.output().chunk(0).vector(0);
        assert_eq!(out.get(0), Value::Int64(1));
    }

    struct OneShot(ResultSet, bool);
    impl PhysicalOperator for OneShot {
        fn get_next_tuple(&mut self, _ctx: &QueryContext) -> Result<bool> {
            if self.1 {
                return Ok(false);
            }
            self.1 = true;
            Ok(true)
        }
        fn output(&self) -> &ResultSet {
            &self.0
        }
        fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
            unimplemented!()
        }
        fn is_source(&self) -> bool {
            true
        }
    }

    #[test]
    fn set_rel_property_patches_the_value_and_re_emits_the_id() {
        use vgraph_storage::{InMemoryRelTable, RelTable};

        let table: Arc<dyn RelTable> = Arc::new(InMemoryRelTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));
        let rel_id = table
            .insert(&tx, NodeId::new(0, 1), NodeId::new(1, 1), HashMap::new())
            .unwrap();
        table.commit(&tx);

        let vector = ValueVector::from_values(LogicalType::Rel, &[Value::Rel(rel_id)]).unwrap();
        let source = OneShot(ResultSet::new(vec![DataChunk::new(vec![vector])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut op = SetRelProperty::new(Box::new(source), Arc::clone(&table), Arc::clone(&tx), wal, 0, "since".into(), Value::Int64(2021));
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(op.get_next_tuple(&ctx).unwrap());
        assert_eq!(op.output().chunk(0).vector(0).get(0), Value::Rel(rel_id));
        assert_eq!(table.get_property(&tx, rel_id, "since").unwrap(), Value::Int64(2021));
    }

    #[test]
    fn delete_rel_reports_rows_deleted() {
        use vgraph_storage::{InMemoryRelTable, RelTable};

        let table: Arc<dyn RelTable> = Arc::new(InMemoryRelTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));
        let rel_id = table
            .insert(&tx, NodeId::new(0, 1), NodeId::new(1, 1), HashMap::new())
            .unwrap();
        table.commit(&tx);

        let vector = ValueVector::from_values(LogicalType::Rel, &[Value::Rel(rel_id)]).unwrap();
        let source = OneShot(ResultSet::new(vec![DataChunk::new(vec![vector])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut delete = DeleteRel::new(Box::new(source), table, tx, wal, 0);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(delete.get_next_tuple(&ctx).unwrap());
        assert_eq!(delete.output().chunk(0).vector(0).get(0), Value::Int64(1));
    }

    #[test]
    fn merge_creates_a_node_when_unmatched() {
        let table: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));

        let mark = ValueVector::from_values(LogicalType::Bool, &[Value::Bool(false)]).unwrap();
        let matched = ValueVector::with_capacity(LogicalType::Node, 1);
        let source = OneShot(ResultSet::new(vec![DataChunk::new(vec![mark, matched])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut op = Merge::new(
            Box::new(source),
            Arc::clone(&table),
            Arc::clone(&tx),
            wal,
            0,
            1,
            vec![("created".into(), Value::Bool(true))],
            vec![],
        );
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(op.get_next_tuple(&ctx).unwrap());
        let Value::Node(node_id) = op.output().chunk(0).vector(0).get(0) else {
            panic!("expected a node id");
        };
        assert_eq!(table.get_property(&tx, node_id, "created").unwrap(), Value::Bool(true));
    }

    #[test]
    fn merge_patches_the_matched_node_when_marked() {
        let table: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));
        let existing = table.insert(&tx, HashMap::new()).unwrap();
        table.commit(&tx);

        let mark = ValueVector::from_values(LogicalType::Bool, &[Value::Bool(true)]).unwrap();
        let matched = ValueVector::from_values(LogicalType::Node, &[Value::Node(existing)]).unwrap();
        let source = OneShot(ResultSet::new(vec![DataChunk::new(vec![mark, matched])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut op = Merge::new(
            Box::new(source),
            Arc::clone(&table),
            Arc::clone(&tx),
            wal,
            0,
            1,
            vec![],
            vec![("seen".into(), Value::Bool(true))],
        );
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(op.get_next_tuple(&ctx).unwrap());
        assert_eq!(op.output().chunk(0).vector(0).get(0), Value::Node(existing));
        assert_eq!(table.get_property(&tx, existing, "seen").unwrap(), Value::Bool(true));
    }

    #[test]
    fn copy_node_inserts_every_row_of_the_batch() {
        let table: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));

        let names = ValueVector::from_values(
            LogicalType::String,
            &[Value::String("a".into()), Value::String("b".into())],
        )
        .unwrap();
        let source = OneShot(ResultSet::new(vec![DataChunk::new(vec![names])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut op = CopyNode::new(Box::new(source), table, tx, wal, vec![0], vec!["name".into()]);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(op.get_next_tuple(&ctx).unwrap());
        assert_eq!(op.output().chunk(0).vector(0).get(0), Value::Int64(2));
    }

    #[test]
    fn copy_rel_inserts_every_row_of_the_batch() {
        let table: Arc<dyn RelTable> = Arc::new(vgraph_storage::InMemoryRelTable::new(0));
        let manager = TransactionManager::new();
        let tx = Arc::new(manager.begin(TransactionMode::Write));

        let src = ValueVector::from_values(
            LogicalType::Node,
            &[Value::Node(NodeId::new(0, 1)), Value::Node(NodeId::new(1, 1))],
        )
        .unwrap();
        let dst = ValueVector::from_values(
            LogicalType::Node,
            &[Value::Node(NodeId::new(1, 1)), Value::Node(NodeId::new(2, 1))],
        )
        .unwrap();
        let source = OneShot(ResultSet::new(vec![DataChunk::new(vec![src, dst])]), false);
        let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
        let mut op = CopyRel::new(Box::new(source), table, tx, wal, 0, 1, vec![], vec![]);
        let ctx = QueryContext::new(1, crate::context::ExecConfig::default());
        assert!(op.get_next_tuple(&ctx).unwrap());
        assert_eq!(op.output().chunk(0).vector(0).get(0), Value::Int64(2));
    }
}
