//! # Merge Projection
//!
//! A projection whose expressions are the identity column refs `#0.0,
//! #0.1, ...` over a shape-equal child adds nothing but a rename. It is
//! replaced by the child carrying the projection's output schema, so the
//! chosen column names survive.

use crate::optimizer::{OptimizerContext, OptimizerRule};
use crate::plan::{PlanKind, PlanRef};
use std::sync::Arc;

pub struct MergeProjection;

impl OptimizerRule for MergeProjection {
    fn name(&self) -> &'static str {
        "merge-projection"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::Projection { exprs } = plan.kind() else {
            return None;
        };
        let child = plan.child(0);

        if !plan.output_schema().shape_equal(child.output_schema()) {
            return None;
        }
        let identical = exprs
            .iter()
            .enumerate()
            .all(|(idx, expr)| expr.as_column_ref() == Some((0, idx)));
        if !identical {
            return None;
        }

        Some(child.with_schema(Arc::clone(plan.output_schema())))
    }
}
