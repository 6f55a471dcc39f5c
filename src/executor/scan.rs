//! # Table and Index Scans
//!
//! The sequential scan walks the heap through a snapshot iterator created
//! at `init`, so rows inserted afterwards (including the scan's own
//! downstream mutations) stay invisible. Tombstoned rows are skipped
//! here; the heap iterator itself yields them.
//!
//! The index scan serves two plan shapes: a point lookup against an
//! equality key, and an ordered full traversal (for the order-by
//! rewrite). Both fetch the actual rows from the heap by RID.

use super::{Executor, ExecutorContext};
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::expr::ExpressionRef;
use crate::index::IndexKey;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, TableHeap, TableIter, Tuple};
use crate::types::{Schema, Value};
use eyre::Result;
use std::sync::Arc;

pub struct SeqScanExecutor {
    schema: Arc<Schema>,
    heap: Arc<TableHeap>,
    predicate: Option<ExpressionRef>,
    iter: Option<TableIter>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &PlanRef) -> Result<SeqScanExecutor> {
        let PlanKind::SeqScan {
            table_oid,
            predicate,
            ..
        } = plan.kind()
        else {
            engine_bail!(ErrorKind::Invariant, "SeqScanExecutor needs a SeqScan plan");
        };
        let table = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(SeqScanExecutor {
            schema: Arc::clone(plan.output_schema()),
            heap: Arc::clone(table.heap()),
            predicate: predicate.clone(),
            iter: None,
        })
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(self.heap.iter()?);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some(iter) = self.iter.as_mut() else {
            engine_bail!(ErrorKind::Invariant, "seq scan pulled before init");
        };
        for item in iter {
            let (meta, tuple) = item?;
            if meta.is_deleted {
                continue;
            }
            if let Some(predicate) = &self.predicate {
                if predicate.eval(&tuple, &self.schema)? != Value::Boolean(true) {
                    continue;
                }
            }
            let rid = tuple.rid().expect("heap tuples carry a rid");
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

pub struct IndexScanExecutor {
    schema: Arc<Schema>,
    ctx: Arc<ExecutorContext>,
    table_oid: u32,
    index_name: String,
    lookup_key: Option<Vec<Value>>,
    heap: Arc<TableHeap>,
    rids: Vec<Rid>,
    cursor: usize,
}

impl IndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &PlanRef) -> Result<IndexScanExecutor> {
        let PlanKind::IndexScan {
            table_oid,
            index_name,
            lookup_key,
        } = plan.kind()
        else {
            engine_bail!(ErrorKind::Invariant, "IndexScanExecutor needs an IndexScan plan");
        };
        let table = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(IndexScanExecutor {
            schema: Arc::clone(plan.output_schema()),
            table_oid: *table_oid,
            index_name: index_name.clone(),
            lookup_key: lookup_key.clone(),
            heap: Arc::clone(table.heap()),
            ctx,
            rids: Vec::new(),
            cursor: 0,
        })
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        let table = self.ctx.catalog().table_by_oid(self.table_oid)?;
        let info = self
            .ctx
            .catalog()
            .index(table.name(), &self.index_name)?;

        self.rids = match &self.lookup_key {
            Some(values) => info.index().scan_key(&IndexKey::new(values.clone())),
            None => match info.index().scan_all() {
                Some(rids) => rids,
                None => engine_bail!(
                    ErrorKind::Invariant,
                    "index '{}' does not support ordered scans",
                    self.index_name
                ),
            },
        };
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
