//! # Sort, Limit, TopN
//!
//! Sort buffers the whole child and stable-sorts it by the ordering key
//! vector, so ties keep their arrival order. Limit forwards at most `n`
//! rows. TopN is the fused form the optimizer rewrites `Sort + Limit`
//! into: a bounded priority buffer holding the `n` best rows, with the
//! insertion sequence as the stable tiebreak.

use super::Executor;
use crate::binder::OrderDirection;
use crate::expr::ExpressionRef;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::types::{Schema, Value};
use eyre::Result;
use std::cmp::Ordering;
use std::sync::Arc;

type OrderBys = Vec<(OrderDirection, ExpressionRef)>;

fn compare_keys(a: &[Value], b: &[Value], order_bys: &OrderBys) -> Ordering {
    for ((direction, _), (x, y)) in order_bys.iter().zip(a.iter().zip(b)) {
        let ordering = x.compare_for_sort(y);
        let ordering = if direction.is_descending() {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn eval_keys(order_bys: &OrderBys, tuple: &Tuple, schema: &Schema) -> Result<Vec<Value>> {
    order_bys
        .iter()
        .map(|(_, expr)| expr.eval(tuple, schema))
        .collect()
}

pub struct SortExecutor {
    schema: Arc<Schema>,
    order_bys: OrderBys,
    child: Box<dyn Executor>,
    sorted: Vec<(Tuple, Rid)>,
    cursor: usize,
}

impl SortExecutor {
    pub fn new(plan: &PlanRef, child: Box<dyn Executor>) -> SortExecutor {
        let order_bys = match plan.kind() {
            PlanKind::Sort { order_bys } => order_bys.clone(),
            _ => Vec::new(),
        };
        SortExecutor {
            schema: Arc::clone(plan.output_schema()),
            order_bys,
            child,
            sorted: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.sorted.clear();
        self.cursor = 0;

        let mut rows: Vec<(Vec<Value>, Tuple, Rid)> = Vec::new();
        while let Some((tuple, rid)) = self.child.next()? {
            let keys = eval_keys(&self.order_bys, &tuple, self.child.output_schema())?;
            rows.push((keys, tuple, rid));
        }
        // sort_by is stable, so equal keys keep child order.
        rows.sort_by(|a, b| compare_keys(&a.0, &b.0, &self.order_bys));
        self.sorted = rows.into_iter().map(|(_, t, r)| (t, r)).collect();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.cursor >= self.sorted.len() {
            return Ok(None);
        }
        let row = self.sorted[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

pub struct LimitExecutor {
    schema: Arc<Schema>,
    limit: usize,
    emitted: usize,
    child: Box<dyn Executor>,
}

impl LimitExecutor {
    pub fn new(plan: &PlanRef, child: Box<dyn Executor>) -> LimitExecutor {
        let limit = match plan.kind() {
            PlanKind::Limit { limit } => *limit,
            _ => usize::MAX,
        };
        LimitExecutor {
            schema: Arc::clone(plan.output_schema()),
            limit,
            emitted: 0,
            child,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> Result<()> {
        self.emitted = 0;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.emitted >= self.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// A buffered row plus its sort keys and arrival sequence. Later arrivals
/// rank "worse" on ties, which preserves the stable-sort semantics of the
/// unfused plan.
struct HeapRow {
    keys: Vec<Value>,
    seq: usize,
    tuple: Tuple,
    rid: Rid,
}

pub struct TopNExecutor {
    schema: Arc<Schema>,
    n: usize,
    order_bys: OrderBys,
    child: Box<dyn Executor>,
    sorted: Vec<(Tuple, Rid)>,
    cursor: usize,
}

impl TopNExecutor {
    pub fn new(plan: &PlanRef, child: Box<dyn Executor>) -> TopNExecutor {
        let (n, order_bys) = match plan.kind() {
            PlanKind::TopN { n, order_bys } => (*n, order_bys.clone()),
            _ => (0, Vec::new()),
        };
        TopNExecutor {
            schema: Arc::clone(plan.output_schema()),
            n,
            order_bys,
            child,
            sorted: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.sorted.clear();
        self.cursor = 0;
        if self.n == 0 {
            return Ok(());
        }

        // Bounded, always-sorted buffer of the n best rows seen so far.
        // New rows binary-search their slot; whatever falls off the end
        // is the current worst.
        let mut kept: Vec<HeapRow> = Vec::with_capacity(self.n + 1);
        let mut seq = 0usize;
        while let Some((tuple, rid)) = self.child.next()? {
            let keys = eval_keys(&self.order_bys, &tuple, self.child.output_schema())?;
            let row = HeapRow {
                keys,
                seq,
                tuple,
                rid,
            };
            seq += 1;

            let pos = kept.partition_point(|r| {
                compare_keys(&r.keys, &row.keys, &self.order_bys)
                    .then(r.seq.cmp(&row.seq))
                    != Ordering::Greater
            });
            if pos < self.n {
                kept.insert(pos, row);
                kept.truncate(self.n);
            }
        }

        self.sorted = kept.into_iter().map(|r| (r.tuple, r.rid)).collect();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.cursor >= self.sorted.len() {
            return Ok(None);
        }
        let row = self.sorted[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
