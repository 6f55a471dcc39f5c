//! # Filter
//!
//! Pulls child rows and keeps those whose predicate evaluates to exactly
//! `true`; tri-valued logic treats both `false` and NULL as "drop".

use super::Executor;
use crate::expr::ExpressionRef;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::types::{Schema, Value};
use eyre::Result;
use std::sync::Arc;

pub struct FilterExecutor {
    schema: Arc<Schema>,
    predicate: ExpressionRef,
    child: Box<dyn Executor>,
}

impl FilterExecutor {
    pub fn new(plan: &PlanRef, child: Box<dyn Executor>) -> FilterExecutor {
        let predicate = match plan.kind() {
            PlanKind::Filter { predicate } => predicate.clone(),
            _ => crate::expr::Expression::constant(Value::Boolean(true)),
        };
        FilterExecutor {
            schema: Arc::clone(plan.output_schema()),
            predicate,
            child,
        }
    }
}

impl Executor for FilterExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while let Some((tuple, rid)) = self.child.next()? {
            let verdict = self.predicate.eval(&tuple, self.child.output_schema())?;
            if verdict == Value::Boolean(true) {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
