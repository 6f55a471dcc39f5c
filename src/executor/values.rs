//! # Values
//!
//! Emits a compiled constant row set, one row per `next`. The planner
//! uses a single empty row for `SELECT` without a FROM clause so constant
//! select lists still produce output.

use super::Executor;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::types::Schema;
use eyre::Result;
use std::sync::Arc;

pub struct ValuesExecutor {
    schema: Arc<Schema>,
    rows: Vec<Vec<crate::expr::ExpressionRef>>,
    cursor: usize,
}

impl ValuesExecutor {
    pub fn new(plan: &PlanRef) -> ValuesExecutor {
        let rows = match plan.kind() {
            PlanKind::Values { rows } => rows.clone(),
            _ => Vec::new(),
        };
        ValuesExecutor {
            schema: Arc::clone(plan.output_schema()),
            rows,
            cursor: 0,
        }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let row = &self.rows[self.cursor];
        self.cursor += 1;

        let unit = Tuple::empty();
        let empty = Schema::default();
        let mut values = Vec::with_capacity(row.len());
        for expr in row {
            values.push(expr.eval(&unit, &empty)?);
        }
        let tuple = Tuple::from_values(&values, &self.schema)?;
        Ok(Some((tuple, Rid::INVALID)))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
