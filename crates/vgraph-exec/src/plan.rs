//! The plan mapper: turns a small, hand-built logical plan tree into a
//! tree of [`PhysicalOperator`]s, injecting the same three operator kinds
//! kuzu's mapper injects around its own logical nodes — a result
//! collector at the root of anything a caller wants materialized, a
//! `Flatten` between an unflat producer and a consumer that needs one row
//! at a time, and a `SemiMasker` wherever a join's build side should feed
//! a shared mask back into an upstream scan.
//!
//! `Flatten` is not an automatic pass over the tree: like every other
//! operator here, the caller building the plan picks a `LogicalPlan::Flatten`
//! node at the exact point an unflat producer feeds a row-at-a-time
//! consumer, and `map_plan` mechanically turns it into the physical
//! operator, the same as any other variant.

use std::sync::Arc;

use vgraph_error::Result;
use vgraph_storage::{NodeTable, RelTable, Transaction, Wal};
use vgraph_types::{LogicalType, NodeId, Value};
use vgraph_vector::{ColumnDescriptor, FactorizedTable, ResultSet, TableSchema};

use crate::context::QueryContext;
use crate::flatten::Flatten;
use crate::operator::PhysicalOperator;
use crate::scan::{ScanNodeId, ScanNodeIdSharedState, ScanNodeProperty};
use crate::semi_mask::SemiMask;
use crate::writing::{
    CopyNode, CopyRel, CreateNode, CreateRel, DeleteNode, DeleteRel, Merge, SetNodeProperty, SetRelProperty,
};

/// A hand-constructed plan node. Stands in for what a binder/optimizer
/// would normally produce; building one of these directly is the
/// caller's job, not this crate's.
pub enum LogicalPlan {
    ScanNodeId {
        table: Arc<dyn NodeTable>,
        shared: Arc<ScanNodeIdSharedState>,
    },
    ScanNodeProperty {
        child: Box<LogicalPlan>,
        table: Arc<dyn NodeTable>,
        input_vector_idx: u32,
        properties: Vec<String>,
    },
    SemiMasker {
        child: Box<LogicalPlan>,
        mask: Arc<SemiMask>,
        masker_idx: u8,
        node_vector_idx: u32,
    },
    CreateNode {
        child: Option<Box<LogicalPlan>>,
        table: Arc<dyn NodeTable>,
        primary_key: Option<String>,
        literal_properties: Vec<(String, Value)>,
    },
    SetNodeProperty {
        child: Box<LogicalPlan>,
        table: Arc<dyn NodeTable>,
        input_vector_idx: u32,
        property: String,
        value: Value,
    },
    DeleteNode {
        child: Box<LogicalPlan>,
        table: Arc<dyn NodeTable>,
        input_vector_idx: u32,
    },
    CreateRel {
        table: Arc<dyn RelTable>,
        src: NodeId,
        dst: NodeId,
        properties: Vec<(String, Value)>,
    },
    SetRelProperty {
        child: Box<LogicalPlan>,
        table: Arc<dyn RelTable>,
        input_vector_idx: u32,
        property: String,
        value: Value,
    },
    DeleteRel {
        child: Box<LogicalPlan>,
        table: Arc<dyn RelTable>,
        input_vector_idx: u32,
    },
    Merge {
        child: Box<LogicalPlan>,
        table: Arc<dyn NodeTable>,
        mark_vector_idx: u32,
        matched_node_vector_idx: u32,
        on_create_properties: Vec<(String, Value)>,
        on_match_properties: Vec<(String, Value)>,
    },
    CopyNode {
        child: Box<LogicalPlan>,
        table: Arc<dyn NodeTable>,
        property_vector_indices: Vec<u32>,
        property_names: Vec<String>,
    },
    CopyRel {
        child: Box<LogicalPlan>,
        table: Arc<dyn RelTable>,
        src_vector_idx: u32,
        dst_vector_idx: u32,
        property_vector_indices: Vec<u32>,
        property_names: Vec<String>,
    },
    /// Re-emits one row at a time from the `chunk_idx` chunk of `child`'s
    /// output, used right before an indexed single-row write whose child
    /// may produce an unflat selection (e.g. a many-to-many join result).
    Flatten { child: Box<LogicalPlan>, chunk_idx: u32 },
}

/// Everything the mapper needs that isn't already in the plan tree: the
/// transaction every operator reads/writes under and the WAL writing
/// operators log to.
pub struct MapperContext {
    pub tx: Arc<Transaction>,
    pub wal: Arc<dyn Wal>,
}

/// Maps one [`LogicalPlan`] node to its physical operator, dispatching by
/// variant the same way kuzu's `PlanMapper::mapOperator` switches on
/// `LogicalOperatorType`.
pub fn map_plan(plan: &LogicalPlan, ctx: &MapperContext) -> Result<Box<dyn PhysicalOperator>> {
    match plan {
        LogicalPlan::ScanNodeId { table, shared } => Ok(Box::new(ScanNodeId::new(
            Arc::clone(table),
            Arc::clone(&ctx.tx),
            Arc::clone(shared),
        ))),
        LogicalPlan::ScanNodeProperty {
            child,
            table,
            input_vector_idx,
            properties,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(ScanNodeProperty::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                *input_vector_idx,
                properties.clone(),
            )))
        }
        LogicalPlan::SemiMasker {
            child,
            mask,
            masker_idx,
            node_vector_idx,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(SemiMasker::new(child_op, Arc::clone(mask), *masker_idx, *node_vector_idx)))
        }
        LogicalPlan::CreateNode {
            child,
            table,
            primary_key,
            literal_properties,
        } => {
            let child_op = child.as_ref().map(|c| map_plan(c, ctx)).transpose()?;
            Ok(Box::new(CreateNode::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                primary_key.clone(),
                literal_properties.clone(),
            )))
        }
        LogicalPlan::SetNodeProperty {
            child,
            table,
            input_vector_idx,
            property,
            value,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(SetNodeProperty::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                *input_vector_idx,
                property.clone(),
                value.clone(),
            )))
        }
        LogicalPlan::DeleteNode {
            child,
            table,
            input_vector_idx,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(DeleteNode::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                *input_vector_idx,
            )))
        }
        LogicalPlan::CreateRel { table, src, dst, properties } => Ok(Box::new(CreateRel::new(
            Arc::clone(table),
            Arc::clone(&ctx.tx),
            Arc::clone(&ctx.wal),
            *src,
            *dst,
            properties.clone(),
        ))),
        LogicalPlan::SetRelProperty {
            child,
            table,
            input_vector_idx,
            property,
            value,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(SetRelProperty::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                *input_vector_idx,
                property.clone(),
                value.clone(),
            )))
        }
        LogicalPlan::DeleteRel {
            child,
            table,
            input_vector_idx,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(DeleteRel::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                *input_vector_idx,
            )))
        }
        LogicalPlan::Merge {
            child,
            table,
            mark_vector_idx,
            matched_node_vector_idx,
            on_create_properties,
            on_match_properties,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(Merge::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                *mark_vector_idx,
                *matched_node_vector_idx,
                on_create_properties.clone(),
                on_match_properties.clone(),
            )))
        }
        LogicalPlan::CopyNode {
            child,
            table,
            property_vector_indices,
            property_names,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(CopyNode::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                property_vector_indices.clone(),
                property_names.clone(),
            )))
        }
        LogicalPlan::CopyRel {
            child,
            table,
            src_vector_idx,
            dst_vector_idx,
            property_vector_indices,
            property_names,
        } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(CopyRel::new(
                child_op,
                Arc::clone(table),
                Arc::clone(&ctx.tx),
                Arc::clone(&ctx.wal),
                *src_vector_idx,
                *dst_vector_idx,
                property_vector_indices.clone(),
                property_names.clone(),
            )))
        }
        LogicalPlan::Flatten { child, chunk_idx } => {
            let child_op = map_plan(child, ctx)?;
            Ok(Box::new(Flatten::new(child_op, *chunk_idx)))
        }
    }
}

/// Marks a shared [`SemiMask`] for every node id its child produces, then
/// passes the rows through unchanged — the injected operator a join's
/// build side gets wired through so an upstream scan can skip rows the
/// join would discard.
pub struct SemiMasker {
    child: Box<dyn PhysicalOperator>,
    mask: Arc<SemiMask>,
    masker_idx: u8,
    node_vector_idx: u32,
}

impl SemiMasker {
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>, mask: Arc<SemiMask>, masker_idx: u8, node_vector_idx: u32) -> Self {
        Self {
            child,
            mask,
            masker_idx,
            node_vector_idx,
        }
    }
}

impl PhysicalOperator for SemiMasker {
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool> {
        ctx.check_interrupted()?;
        if !self.child.get_next_tuple(ctx)? {
            return Ok(false);
        }
        let output = self.child.output();
        let vector = output.chunk(0).vector(self.node_vector_idx as usize);
        for pos in output.chunk(0).state().lock().iter() {
            if let Value::Node(node_id) = vector.get(pos as usize) {
                self.mask.mark(node_id.offset as usize, self.masker_idx);
            }
        }
        Ok(true)
    }

    fn output(&self) -> &ResultSet {
        self.child.output()
    }

    fn clone_operator(&self) -> Box<dyn PhysicalOperator> {
        Box::new(Self::new(
            self.child.clone_operator(),
            Arc::clone(&self.mask),
            self.masker_idx,
            self.node_vector_idx,
        ))
    }
}

/// Drains its child fully into a [`FactorizedTable`], one column per
/// output vector, so a caller (or a test) can read the whole result after
/// the pipeline has run rather than pulling tuple by tuple.
pub struct ResultCollector {
    child: Box<dyn PhysicalOperator>,
    column_types: Vec<LogicalType>,
}

impl ResultCollector {
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>, column_types: Vec<LogicalType>) -> Self {
        Self { child, column_types }
    }

    /// Run the child to exhaustion and return the materialized table.
    pub fn collect(mut self, ctx: &QueryContext) -> Result<FactorizedTable> {
        let columns = self
            .column_types
            .iter()
            .enumerate()
            .map(|(i, t)| ColumnDescriptor::flat(format!("col_{i}"), *t))
            .collect();
        let mut table = FactorizedTable::new(TableSchema::new(columns));
        while self.child.get_next_tuple(ctx)? {
            let output = self.child.output();
            for pos in output.chunk(0).state().lock().iter() {
                let row: Vec<Value> = (0..self.column_types.len())
                    .map(|col| output.chunk(0).vector(col).get(pos as usize))
                    .collect();
                table.append_row(row)?;
            }
        }
        Ok(table)
    }
}
