//! # Volcano Executors
//!
//! Pull-based operator pipeline. Each executor implements [`Executor`]:
//! `init` runs exactly once before the first `next`, `next` produces one
//! row per call and keeps returning `None` once exhausted, and
//! `output_schema` describes the rows it emits. Executors own their
//! children; the factory builds the executor tree by dispatching on
//! [`PlanKind`].
//!
//! ## Operator Files
//!
//! - `scan`: sequential scan, index scan
//! - `vector_scan`: vector index scan
//! - `mock_scan`: hard-coded tables for tests
//! - `values`: compiled constant rows
//! - `filter`, `projection`: row-at-a-time transforms
//! - `join`: nested-loop, hash, nested-index joins
//! - `aggregation`: hash aggregation with insertion-ordered groups
//! - `sort`: sort, limit, top-n
//! - `dml`: insert, update, delete with secondary-index maintenance
//! - `init_check`: instrumented wrapper asserting the pipeline contract
//! - `engine`: drives the root executor and materializes results
//!
//! ## Context
//!
//! The [`ExecutorContext`] carries the catalog, the optional transaction
//! handle, and the session configuration. Executors are created per
//! statement, live for one `execute` call, and are dropped afterwards.

mod aggregation;
mod dml;
mod engine;
mod filter;
mod init_check;
mod join;
pub mod mock_scan;
mod projection;
mod scan;
mod sort;
mod values;
mod vector_scan;

pub use aggregation::AggregationExecutor;
pub use dml::{DeleteExecutor, InsertExecutor, UpdateExecutor};
pub use engine::ExecutionEngine;
pub use filter::FilterExecutor;
pub use init_check::{InitCheckCounters, InitCheckExecutor};
pub use join::{HashJoinExecutor, NestedIndexJoinExecutor, NestedLoopJoinExecutor};
pub use mock_scan::MockScanExecutor;
pub use projection::ProjectionExecutor;
pub use scan::{IndexScanExecutor, SeqScanExecutor};
pub use sort::{LimitExecutor, SortExecutor, TopNExecutor};
pub use values::ValuesExecutor;
pub use vector_scan::VectorIndexScanExecutor;

use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::txn::Transaction;
use crate::types::Schema;
use eyre::Result;
use std::sync::Arc;

/// Everything an executor needs besides its plan payload.
pub struct ExecutorContext {
    catalog: Arc<Catalog>,
    txn: Option<Transaction>,
    config: SessionConfig,
}

impl ExecutorContext {
    pub fn new(catalog: Arc<Catalog>) -> ExecutorContext {
        ExecutorContext {
            catalog,
            txn: None,
            config: SessionConfig::default(),
        }
    }

    pub fn with_txn(mut self, txn: Transaction) -> ExecutorContext {
        self.txn = Some(txn);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> ExecutorContext {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn txn(&self) -> Option<&Transaction> {
        self.txn.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// One operator in the pull pipeline.
pub trait Executor {
    /// Called exactly once before the first `next`. Initializes children
    /// and pre-materializes whatever the operator buffers.
    fn init(&mut self) -> Result<()>;

    /// Produces the next row, or `None` when exhausted. Must stay `None`
    /// on every call after exhaustion.
    fn next(&mut self) -> Result<Option<(Tuple, Rid)>>;

    fn output_schema(&self) -> &Arc<Schema>;
}

/// Builds the executor tree mirroring the plan tree.
pub fn create_executor(
    ctx: &Arc<ExecutorContext>,
    plan: &PlanRef,
) -> Result<Box<dyn Executor>> {
    let executor: Box<dyn Executor> = match plan.kind() {
        PlanKind::SeqScan { .. } => Box::new(SeqScanExecutor::new(Arc::clone(ctx), plan)?),
        PlanKind::IndexScan { .. } => Box::new(IndexScanExecutor::new(Arc::clone(ctx), plan)?),
        PlanKind::VectorIndexScan { .. } => {
            Box::new(VectorIndexScanExecutor::new(Arc::clone(ctx), plan)?)
        }
        PlanKind::MockScan { .. } => Box::new(MockScanExecutor::new(plan)?),
        PlanKind::Values { .. } => Box::new(ValuesExecutor::new(plan)),
        PlanKind::Filter { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(FilterExecutor::new(plan, child))
        }
        PlanKind::Projection { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(ProjectionExecutor::new(plan, child))
        }
        PlanKind::NestedLoopJoin { .. } => {
            let left = create_executor(ctx, plan.child(0))?;
            let right = create_executor(ctx, plan.child(1))?;
            Box::new(NestedLoopJoinExecutor::new(plan, left, right))
        }
        PlanKind::HashJoin { .. } => {
            let left = create_executor(ctx, plan.child(0))?;
            let right = create_executor(ctx, plan.child(1))?;
            Box::new(HashJoinExecutor::new(plan, left, right))
        }
        PlanKind::NestedIndexJoin { .. } => {
            let outer = create_executor(ctx, plan.child(0))?;
            Box::new(NestedIndexJoinExecutor::new(Arc::clone(ctx), plan, outer)?)
        }
        PlanKind::Aggregation { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(AggregationExecutor::new(plan, child))
        }
        PlanKind::Sort { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(SortExecutor::new(plan, child))
        }
        PlanKind::Limit { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(LimitExecutor::new(plan, child))
        }
        PlanKind::TopN { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(TopNExecutor::new(plan, child))
        }
        PlanKind::Insert { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(InsertExecutor::new(Arc::clone(ctx), plan, child)?)
        }
        PlanKind::Update { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(UpdateExecutor::new(Arc::clone(ctx), plan, child)?)
        }
        PlanKind::Delete { .. } => {
            let child = create_executor(ctx, plan.child(0))?;
            Box::new(DeleteExecutor::new(Arc::clone(ctx), plan, child)?)
        }
    };
    Ok(executor)
}
