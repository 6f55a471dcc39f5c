//! # Aggregation
//!
//! Hash aggregation: `init` consumes the child entirely, folding every
//! row into the running state of its group. Groups are kept in insertion
//! order so output is deterministic given a deterministic child.
//!
//! Supported aggregates: `count(*)`, `count(expr)`, `sum`, `min`, `max`.
//! NULL arguments are ignored by all of them (`count(*)` counts rows
//! regardless). An empty input with no group keys emits exactly one row
//! of identities: zero counts, NULL sum/min/max. DISTINCT arrives here as
//! a grouping with no aggregates, so `next` simply emits each group key
//! once.

use super::Executor;
use crate::expr::ExpressionRef;
use crate::index::IndexKey;
use crate::plan::{AggregationType, PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::types::{ArithmeticOp, Schema, Value};
use eyre::Result;
use hashbrown::HashMap;
use std::cmp::Ordering;
use std::sync::Arc;

pub struct AggregationExecutor {
    schema: Arc<Schema>,
    group_bys: Vec<ExpressionRef>,
    aggregates: Vec<ExpressionRef>,
    agg_types: Vec<AggregationType>,
    child: Box<dyn Executor>,
    /// Groups in first-seen order; the map holds indices into it.
    groups: Vec<(IndexKey, Vec<Value>)>,
    lookup: HashMap<IndexKey, usize>,
    cursor: usize,
}

impl AggregationExecutor {
    pub fn new(plan: &PlanRef, child: Box<dyn Executor>) -> AggregationExecutor {
        let (group_bys, aggregates, agg_types) = match plan.kind() {
            PlanKind::Aggregation {
                group_bys,
                aggregates,
                agg_types,
            } => (group_bys.clone(), aggregates.clone(), agg_types.clone()),
            _ => (Vec::new(), Vec::new(), Vec::new()),
        };
        AggregationExecutor {
            schema: Arc::clone(plan.output_schema()),
            group_bys,
            aggregates,
            agg_types,
            child,
            groups: Vec::new(),
            lookup: HashMap::new(),
            cursor: 0,
        }
    }

    fn identities(&self) -> Vec<Value> {
        self.agg_types
            .iter()
            .map(|t| match t {
                AggregationType::CountStar | AggregationType::Count => Value::Integer(0),
                _ => Value::Null,
            })
            .collect()
    }

    fn fold(&self, state: &mut [Value], row: &Tuple) -> Result<()> {
        let schema = self.child.output_schema();
        for ((slot, agg_type), expr) in
            state.iter_mut().zip(&self.agg_types).zip(&self.aggregates)
        {
            match agg_type {
                AggregationType::CountStar => {
                    *slot = slot.arithmetic(ArithmeticOp::Add, &Value::Integer(1))?;
                }
                AggregationType::Count => {
                    if !expr.eval(row, schema)?.is_null() {
                        *slot = slot.arithmetic(ArithmeticOp::Add, &Value::Integer(1))?;
                    }
                }
                AggregationType::Sum => {
                    let value = expr.eval(row, schema)?;
                    if !value.is_null() {
                        *slot = if slot.is_null() {
                            value
                        } else {
                            slot.arithmetic(ArithmeticOp::Add, &value)?
                        };
                    }
                }
                AggregationType::Min => {
                    let value = expr.eval(row, schema)?;
                    if !value.is_null()
                        && (slot.is_null()
                            || value.compare(slot) == Some(Ordering::Less))
                    {
                        *slot = value;
                    }
                }
                AggregationType::Max => {
                    let value = expr.eval(row, schema)?;
                    if !value.is_null()
                        && (slot.is_null()
                            || value.compare(slot) == Some(Ordering::Greater))
                    {
                        *slot = value;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.groups.clear();
        self.lookup.clear();
        self.cursor = 0;

        while let Some((row, _)) = self.child.next()? {
            let mut key_values = Vec::with_capacity(self.group_bys.len());
            for expr in &self.group_bys {
                key_values.push(expr.eval(&row, self.child.output_schema())?);
            }
            let key = IndexKey::new(key_values);

            let idx = match self.lookup.get(&key) {
                Some(&idx) => idx,
                None => {
                    let idx = self.groups.len();
                    self.groups.push((key.clone(), self.identities()));
                    self.lookup.insert(key, idx);
                    idx
                }
            };
            let mut state = std::mem::take(&mut self.groups[idx].1);
            self.fold(&mut state, &row)?;
            self.groups[idx].1 = state;
        }

        // No groups and no input: one row of identities.
        if self.groups.is_empty() && self.group_bys.is_empty() {
            self.groups
                .push((IndexKey::new(Vec::new()), self.identities()));
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.cursor >= self.groups.len() {
            return Ok(None);
        }
        let (key, state) = &self.groups[self.cursor];
        self.cursor += 1;

        let mut values: Vec<Value> = key.values().to_vec();
        values.extend(state.iter().cloned());
        Ok(Some((
            Tuple::from_values(&values, &self.schema)?,
            Rid::INVALID,
        )))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
