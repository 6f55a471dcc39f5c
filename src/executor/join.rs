//! # Join Executors
//!
//! Three physical joins, all supporting INNER and LEFT:
//!
//! - **NestedLoopJoin**: drains the right child into a buffer at `init`,
//!   then walks the left child once. A `right_cursor` remembers where the
//!   buffer scan stopped so each `next` call emits exactly one row.
//! - **HashJoin**: builds a hash table over the right child keyed by the
//!   equi-join key expressions, probes it per left row. NULL keys match
//!   nothing.
//! - **NestedIndexJoin**: probes an index on the inner table once per
//!   outer row and fetches matches by RID.
//!
//! LEFT joins emit one null-padded row for a left row with no match; the
//! padding is untyped NULL per right column.

use super::{Executor, ExecutorContext};
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::expr::ExpressionRef;
use crate::index::IndexKey;
use crate::plan::{JoinType, PlanKind, PlanRef};
use crate::storage::{Rid, TableHeap, Tuple};
use crate::types::{Schema, Value};
use eyre::Result;
use hashbrown::HashMap;
use std::sync::Arc;

fn joined_tuple(
    left: &Tuple,
    left_schema: &Schema,
    right: Option<&Tuple>,
    right_schema: &Schema,
    output: &Schema,
) -> Result<Tuple> {
    let mut values = left.values(left_schema)?;
    match right {
        Some(right) => values.extend(right.values(right_schema)?),
        None => {
            values.extend(std::iter::repeat(Value::Null).take(right_schema.column_count()))
        }
    }
    Tuple::from_values(&values, output)
}

pub struct NestedLoopJoinExecutor {
    schema: Arc<Schema>,
    join_type: JoinType,
    predicate: ExpressionRef,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    right_tuples: Vec<Tuple>,
    left_tuple: Option<Tuple>,
    /// Buffer position to resume from; `None` means a fresh left row is
    /// needed (and the current one, if any, has not matched yet).
    right_cursor: Option<usize>,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        plan: &PlanRef,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> NestedLoopJoinExecutor {
        let (join_type, predicate) = match plan.kind() {
            PlanKind::NestedLoopJoin {
                join_type,
                predicate,
            } => (*join_type, predicate.clone()),
            _ => (
                JoinType::Inner,
                crate::expr::Expression::constant(Value::Boolean(true)),
            ),
        };
        NestedLoopJoinExecutor {
            schema: Arc::clone(plan.output_schema()),
            join_type,
            predicate,
            left,
            right,
            right_tuples: Vec::new(),
            left_tuple: None,
            right_cursor: None,
        }
    }

    fn matches(&self, left: &Tuple, right: &Tuple) -> Result<bool> {
        let verdict = self.predicate.eval_join(
            left,
            self.left.output_schema(),
            right,
            self.right.output_schema(),
        )?;
        Ok(verdict == Value::Boolean(true))
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        // Pre-materialize the right side; it is re-walked per left row.
        self.right_tuples.clear();
        while let Some((tuple, _)) = self.right.next()? {
            self.right_tuples.push(tuple);
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            let (start, fresh) = match self.right_cursor {
                Some(cursor) => (cursor, false),
                None => match self.left.next()? {
                    Some((tuple, _)) => {
                        self.left_tuple = Some(tuple);
                        (0, true)
                    }
                    None => return Ok(None),
                },
            };

            let left_tuple = self
                .left_tuple
                .clone()
                .expect("left tuple set before buffer scan");

            for idx in start..self.right_tuples.len() {
                if self.matches(&left_tuple, &self.right_tuples[idx])? {
                    self.right_cursor = Some(idx + 1);
                    let tuple = joined_tuple(
                        &left_tuple,
                        self.left.output_schema(),
                        Some(&self.right_tuples[idx]),
                        self.right.output_schema(),
                        &self.schema,
                    )?;
                    return Ok(Some((tuple, Rid::INVALID)));
                }
            }

            // Buffer exhausted for this left row.
            self.right_cursor = None;
            if fresh && self.join_type == JoinType::Left {
                let tuple = joined_tuple(
                    &left_tuple,
                    self.left.output_schema(),
                    None,
                    self.right.output_schema(),
                    &self.schema,
                )?;
                return Ok(Some((tuple, Rid::INVALID)));
            }
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

pub struct HashJoinExecutor {
    schema: Arc<Schema>,
    join_type: JoinType,
    left_keys: Vec<ExpressionRef>,
    right_keys: Vec<ExpressionRef>,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    table: HashMap<IndexKey, Vec<Tuple>>,
    left_tuple: Option<Tuple>,
    pending: Vec<Tuple>,
    pending_cursor: usize,
}

impl HashJoinExecutor {
    pub fn new(
        plan: &PlanRef,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> HashJoinExecutor {
        let (join_type, left_keys, right_keys) = match plan.kind() {
            PlanKind::HashJoin {
                join_type,
                left_keys,
                right_keys,
            } => (*join_type, left_keys.clone(), right_keys.clone()),
            _ => (JoinType::Inner, Vec::new(), Vec::new()),
        };
        HashJoinExecutor {
            schema: Arc::clone(plan.output_schema()),
            join_type,
            left_keys,
            right_keys,
            left,
            right,
            table: HashMap::new(),
            left_tuple: None,
            pending: Vec::new(),
            pending_cursor: 0,
        }
    }
}

/// Evaluates key expressions against one row; `None` when any key is NULL
/// (NULL join keys match nothing).
fn key_of(exprs: &[ExpressionRef], tuple: &Tuple, schema: &Schema) -> Result<Option<IndexKey>> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = expr.eval(tuple, schema)?;
        if value.is_null() {
            return Ok(None);
        }
        values.push(value);
    }
    Ok(Some(IndexKey::new(values)))
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;

        self.table.clear();
        while let Some((tuple, _)) = self.right.next()? {
            if let Some(key) = key_of(&self.right_keys, &tuple, self.right.output_schema())? {
                self.table.entry(key).or_default().push(tuple);
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.pending_cursor < self.pending.len() {
                let right = self.pending[self.pending_cursor].clone();
                self.pending_cursor += 1;
                let left = self
                    .left_tuple
                    .clone()
                    .expect("pending matches imply a current left row");
                let tuple = joined_tuple(
                    &left,
                    self.left.output_schema(),
                    Some(&right),
                    self.right.output_schema(),
                    &self.schema,
                )?;
                return Ok(Some((tuple, Rid::INVALID)));
            }

            let Some((left, _)) = self.left.next()? else {
                return Ok(None);
            };

            let matches = match key_of(&self.left_keys, &left, self.left.output_schema())? {
                Some(key) => self.table.get(&key).cloned().unwrap_or_default(),
                None => Vec::new(),
            };

            if matches.is_empty() {
                if self.join_type == JoinType::Left {
                    let tuple = joined_tuple(
                        &left,
                        self.left.output_schema(),
                        None,
                        self.right.output_schema(),
                        &self.schema,
                    )?;
                    return Ok(Some((tuple, Rid::INVALID)));
                }
                continue;
            }

            self.left_tuple = Some(left);
            self.pending = matches;
            self.pending_cursor = 0;
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

pub struct NestedIndexJoinExecutor {
    schema: Arc<Schema>,
    join_type: JoinType,
    key_expr: ExpressionRef,
    outer: Box<dyn Executor>,
    ctx: Arc<ExecutorContext>,
    table_oid: u32,
    index_name: String,
    inner_schema: Arc<Schema>,
    inner_heap: Arc<TableHeap>,
    outer_tuple: Option<Tuple>,
    pending: Vec<Tuple>,
    pending_cursor: usize,
}

impl NestedIndexJoinExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: &PlanRef,
        outer: Box<dyn Executor>,
    ) -> Result<NestedIndexJoinExecutor> {
        let PlanKind::NestedIndexJoin {
            join_type,
            table_oid,
            index_name,
            key_expr,
        } = plan.kind()
        else {
            engine_bail!(
                ErrorKind::Invariant,
                "NestedIndexJoinExecutor needs a NestedIndexJoin plan"
            );
        };
        let inner = ctx.catalog().table_by_oid(*table_oid)?;
        Ok(NestedIndexJoinExecutor {
            schema: Arc::clone(plan.output_schema()),
            join_type: *join_type,
            key_expr: key_expr.clone(),
            outer,
            table_oid: *table_oid,
            index_name: index_name.clone(),
            inner_schema: Arc::clone(inner.schema()),
            inner_heap: Arc::clone(inner.heap()),
            ctx,
            outer_tuple: None,
            pending: Vec::new(),
            pending_cursor: 0,
        })
    }
}

impl Executor for NestedIndexJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.outer.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.pending_cursor < self.pending.len() {
                let inner_tuple = self.pending[self.pending_cursor].clone();
                self.pending_cursor += 1;
                let outer = self
                    .outer_tuple
                    .clone()
                    .expect("pending matches imply a current outer row");
                let tuple = joined_tuple(
                    &outer,
                    self.outer.output_schema(),
                    Some(&inner_tuple),
                    &self.inner_schema,
                    &self.schema,
                )?;
                return Ok(Some((tuple, Rid::INVALID)));
            }

            let Some((outer, _)) = self.outer.next()? else {
                return Ok(None);
            };

            let key = self.key_expr.eval(&outer, self.outer.output_schema())?;
            let mut matches = Vec::new();
            if !key.is_null() {
                let table = self.ctx.catalog().table_by_oid(self.table_oid)?;
                let info = self.ctx.catalog().index(table.name(), &self.index_name)?;
                for rid in info.index().scan_key(&IndexKey::new(vec![key])) {
                    let (meta, inner_tuple) = self.inner_heap.get_tuple(rid)?;
                    if !meta.is_deleted {
                        matches.push(inner_tuple);
                    }
                }
            }

            if matches.is_empty() {
                if self.join_type == JoinType::Left {
                    let tuple = joined_tuple(
                        &outer,
                        self.outer.output_schema(),
                        None,
                        &self.inner_schema,
                        &self.schema,
                    )?;
                    return Ok(Some((tuple, Rid::INVALID)));
                }
                continue;
            }

            self.outer_tuple = Some(outer);
            self.pending = matches;
            self.pending_cursor = 0;
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
