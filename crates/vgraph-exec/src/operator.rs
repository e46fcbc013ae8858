//! The physical operator contract: a pull-based (Volcano-style) interface
//! that every scan, join, aggregate, extend, and writing operator
//! implements, plus the per-worker cloning that lets one compiled plan
//! drive many threads.

use vgraph_error::Result;
use vgraph_vector::ResultSet;

use crate::context::QueryContext;

/// One node of the physical plan tree.
///
/// `get_next_tuple` pulls from any children, computes one output batch,
/// and returns whether it produced one (`false` signals end of input).
/// The produced batch lives in the data chunks returned by `output()`,
/// addressed by the [`vgraph_types::DataPos`] values the plan mapper
/// assigned when it wired this operator's output into its parent.
///
/// `clone_operator` is called once per worker thread, after the shared
/// build phase (if any) has completed: it must produce an operator with
/// fresh local state but sharing any read-only or atomically-shared
/// build-side structures (a `HashTable`, a `FactorizedTable`) with the
/// original.
pub trait PhysicalOperator: Send {
    /// One-time per-worker setup, run once before the first
    /// `get_next_tuple` call on a cloned operator.
    fn init_local_state(&mut self, ctx: &QueryContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// # Errors
    /// Propagates a child operator's error, or
    /// [`vgraph_error::ErrorKind::Interrupted`] if `ctx` has been
    /// cancelled.
    fn get_next_tuple(&mut self, ctx: &QueryContext) -> Result<bool>;

    fn output(&self) -> &ResultSet;

    fn clone_operator(&self) -> Box<dyn PhysicalOperator>;

    fn is_source(&self) -> bool {
        false
    }

    /// Run once after a worker's last `get_next_tuple` returns `false`,
    /// used by pipeline-breaker sink operators (hash join build, the
    /// shared aggregate state) to merge per-worker partial results.
    fn finalize(&mut self, ctx: &QueryContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}
