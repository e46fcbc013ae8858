//! The execution core: vectorized, morsel-scheduled physical operators
//! driven by a pull-based (Volcano-style) pipeline, plus the small hand
//! built plan mapper that wires them together.

pub mod aggregate;
pub mod context;
pub mod flatten;
pub mod hash_join;
pub mod operator;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod recursive_extend;
pub mod scan;
pub mod semi_mask;
pub mod writing;

pub use aggregate::{AccumulatorState, AggregateFunction, HashAggregate, SimpleAggregate};
pub use context::{ExecConfig, QueryContext};
pub use flatten::Flatten;
pub use hash_join::{hash_join_build, hash_join_probe, HashJoinTable, JoinType};
pub use operator::PhysicalOperator;
pub use pipeline::{Morsel, MorselDispatcher, TaskScheduler};
pub use plan::{map_plan, LogicalPlan, MapperContext, ResultCollector, SemiMasker};
pub use progress::{CoalescingProgressTracker, ProgressBarDisplay, RecordingProgressDisplay};
pub use recursive_extend::{run_bfs, FrontierMorsel, IfeMorsel};
pub use scan::{ScanNodeId, ScanNodeIdSharedState, ScanNodeProperty};
pub use semi_mask::SemiMask;
pub use writing::{
    CopyNode, CopyRel, CreateNode, CreateRel, DeleteNode, DeleteRel, Merge, SetNodeProperty, SetRelProperty,
};
