//! # Projection
//!
//! Evaluates its expression vector against each child row. The output
//! schema was inferred once at plan time; re-serializing through it also
//! keeps vector dimensions honest.

use super::Executor;
use crate::expr::ExpressionRef;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::types::Schema;
use eyre::Result;
use std::sync::Arc;

pub struct ProjectionExecutor {
    schema: Arc<Schema>,
    exprs: Vec<ExpressionRef>,
    child: Box<dyn Executor>,
}

impl ProjectionExecutor {
    pub fn new(plan: &PlanRef, child: Box<dyn Executor>) -> ProjectionExecutor {
        let exprs = match plan.kind() {
            PlanKind::Projection { exprs } => exprs.clone(),
            _ => Vec::new(),
        };
        ProjectionExecutor {
            schema: Arc::clone(plan.output_schema()),
            exprs,
            child,
        }
    }
}

impl Executor for ProjectionExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some((tuple, _)) = self.child.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            values.push(expr.eval(&tuple, self.child.output_schema())?);
        }
        Ok(Some((
            Tuple::from_values(&values, &self.schema)?,
            Rid::INVALID,
        )))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
