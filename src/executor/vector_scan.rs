//! # Vector Index Scan
//!
//! Executes the plan the optimizer produces from the `ORDER BY
//! distance(...) LIMIT k` pattern: ask the vector index for the top-k
//! RIDs, then fetch each row from the heap. Rows come out in the index's
//! returned order; the index is approximate and no re-ranking happens
//! here. A tombstoned RID is skipped (the index may lag behind deletes),
//! and `k = 0` emits nothing without touching the index.

use super::{Executor, ExecutorContext};
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, TableHeap, Tuple};
use crate::types::Schema;
use eyre::Result;
use std::sync::Arc;

pub struct VectorIndexScanExecutor {
    schema: Arc<Schema>,
    ctx: Arc<ExecutorContext>,
    table_oid: u32,
    index_name: String,
    query: Vec<f64>,
    k: usize,
    heap: Arc<TableHeap>,
    rids: Vec<Rid>,
    cursor: usize,
}

impl VectorIndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &PlanRef) -> Result<VectorIndexScanExecutor> {
        let PlanKind::VectorIndexScan {
            table_oid,
            index_name,
            query,
            k,
        } = plan.kind()
        else {
            engine_bail!(
                ErrorKind::Invariant,
                "VectorIndexScanExecutor needs a VectorIndexScan plan"
            );
        };
        let table = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(VectorIndexScanExecutor {
            schema: Arc::clone(plan.output_schema()),
            table_oid: *table_oid,
            index_name: index_name.clone(),
            query: query.clone(),
            k: *k,
            heap: Arc::clone(table.heap()),
            ctx,
            rids: Vec::new(),
            cursor: 0,
        })
    }
}

impl Executor for VectorIndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        if self.k == 0 {
            self.rids.clear();
            return Ok(());
        }
        let table = self.ctx.catalog().table_by_oid(self.table_oid)?;
        let info = self
            .ctx
            .catalog()
            .index(table.name(), &self.index_name)?;
        self.rids = info.index().scan_vector(&self.query, self.k)?;
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while self.cursor < self.rids.len() {
            let rid = self.rids[self.cursor];
            self.cursor += 1;
            let (meta, tuple) = self.heap.get_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
