//! # Mutation Executors
//!
//! Insert, update and delete each drain their child at the first `next`
//! call, apply the mutation to the table heap and to every index on the
//! target table, then emit a single one-column row with the affected row
//! count. Subsequent calls return `None`.
//!
//! ## Index Maintenance
//!
//! For every index on the table the key is extracted with the index's
//! `key_attrs` and inserted/deleted alongside the heap mutation. Index
//! inserts that report a swallowed duplicate do not reduce the emitted
//! count; the count reflects heap appends.
//!
//! ## Update Semantics
//!
//! Update is delete-then-insert: the old slot is tombstoned and the
//! rebuilt row appended under a new RID. The child scan's snapshot end
//! keeps the executor from chasing its own inserts (the Halloween
//! problem). The in-place path exists on the heap for the MVCC
//! collaborator, which overrides these semantics when it owns the table.

use super::{Executor, ExecutorContext};
use crate::catalog::TableInfo;
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::expr::ExpressionRef;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple, TupleMeta};
use crate::txn;
use crate::types::{Schema, Value};
use eyre::Result;
use std::sync::Arc;

fn count_row(count: i32, schema: &Schema) -> Result<Tuple> {
    Tuple::from_values(&[Value::Integer(count)], schema)
}

pub struct InsertExecutor {
    schema: Arc<Schema>,
    ctx: Arc<ExecutorContext>,
    table: Arc<TableInfo>,
    child: Box<dyn Executor>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: &PlanRef,
        child: Box<dyn Executor>,
    ) -> Result<InsertExecutor> {
        let PlanKind::Insert { table_oid } = plan.kind() else {
            engine_bail!(ErrorKind::Invariant, "InsertExecutor needs an Insert plan");
        };
        let table = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(InsertExecutor {
            schema: Arc::clone(plan.output_schema()),
            ctx,
            table,
            child,
            done: false,
        })
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        self.done = false;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let meta = TupleMeta {
            ts: txn::commit_ts(self.ctx.txn()),
            is_deleted: false,
        };
        let indexes = self.ctx.catalog().table_indexes(self.table.name());

        let mut count = 0i32;
        while let Some((row, _)) = self.child.next()? {
            // Re-serialize against the table schema; shapes were checked
            // at plan time, this also enforces vector dimensions.
            let values = row.values(self.child.output_schema())?;
            let tuple = Tuple::from_values(&values, self.table.schema())?;
            let rid = self.table.heap().insert(&meta, &tuple)?;
            count += 1;

            for index in &indexes {
                let key = index.key_of(&tuple, self.table.schema())?;
                index.index().insert(&key, rid);
            }
        }

        Ok(Some((count_row(count, &self.schema)?, Rid::INVALID)))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

pub struct UpdateExecutor {
    schema: Arc<Schema>,
    ctx: Arc<ExecutorContext>,
    table: Arc<TableInfo>,
    target_exprs: Vec<ExpressionRef>,
    child: Box<dyn Executor>,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: &PlanRef,
        child: Box<dyn Executor>,
    ) -> Result<UpdateExecutor> {
        let PlanKind::Update {
            table_oid,
            target_exprs,
        } = plan.kind()
        else {
            engine_bail!(ErrorKind::Invariant, "UpdateExecutor needs an Update plan");
        };
        let table = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(UpdateExecutor {
            schema: Arc::clone(plan.output_schema()),
            ctx,
            table,
            target_exprs: target_exprs.clone(),
            child,
            done: false,
        })
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> Result<()> {
        self.done = false;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let ts = txn::commit_ts(self.ctx.txn());
        let indexes = self.ctx.catalog().table_indexes(self.table.name());

        let mut count = 0i32;
        while let Some((old_row, old_rid)) = self.child.next()? {
            let mut new_values = Vec::with_capacity(self.target_exprs.len());
            for expr in &self.target_exprs {
                new_values.push(expr.eval(&old_row, self.child.output_schema())?);
            }
            let new_tuple = Tuple::from_values(&new_values, self.table.schema())?;

            // Delete-then-insert; the new RID may differ.
            self.table.heap().update_meta(
                &TupleMeta {
                    ts,
                    is_deleted: true,
                },
                old_rid,
            )?;
            let new_rid = self.table.heap().insert(
                &TupleMeta {
                    ts,
                    is_deleted: false,
                },
                &new_tuple,
            )?;
            count += 1;

            for index in &indexes {
                let old_key = index.key_of(&old_row, self.table.schema())?;
                index.index().delete(&old_key, old_rid);
                let new_key = index.key_of(&new_tuple, self.table.schema())?;
                index.index().insert(&new_key, new_rid);
            }
        }

        Ok(Some((count_row(count, &self.schema)?, Rid::INVALID)))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

pub struct DeleteExecutor {
    schema: Arc<Schema>,
    ctx: Arc<ExecutorContext>,
    table: Arc<TableInfo>,
    child: Box<dyn Executor>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: &PlanRef,
        child: Box<dyn Executor>,
    ) -> Result<DeleteExecutor> {
        let PlanKind::Delete { table_oid } = plan.kind() else {
            engine_bail!(ErrorKind::Invariant, "DeleteExecutor needs a Delete plan");
        };
        let table = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(DeleteExecutor {
            schema: Arc::clone(plan.output_schema()),
            ctx,
            table,
            child,
            done: false,
        })
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        self.done = false;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let ts = txn::commit_ts(self.ctx.txn());
        let indexes = self.ctx.catalog().table_indexes(self.table.name());

        let mut count = 0i32;
        while let Some((row, rid)) = self.child.next()? {
            self.table.heap().update_meta(
                &TupleMeta {
                    ts,
                    is_deleted: true,
                },
                rid,
            )?;
            count += 1;

            for index in &indexes {
                let key = index.key_of(&row, self.table.schema())?;
                index.index().delete(&key, rid);
            }
        }

        Ok(Some((count_row(count, &self.schema)?, Rid::INVALID)))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
