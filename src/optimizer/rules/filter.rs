//! # Filter Rules
//!
//! - `EliminateTrueFilter`: `Filter(true, x)` is `x`
//! - `MergeFilterScan`: a filter directly above a sequential scan folds
//!   into the scan's pushed-down predicate
//! - `MergeFilterNlj`: a filter above an inner nested-loop join folds
//!   into the join condition (after remapping single-tuple column refs
//!   into left/right join refs)

use crate::expr::{Expression, ExpressionRef, LogicOp};
use crate::optimizer::{OptimizerContext, OptimizerRule};
use crate::plan::{JoinType, PlanKind, PlanNode, PlanRef};
use std::sync::Arc;

pub struct EliminateTrueFilter;

impl OptimizerRule for EliminateTrueFilter {
    fn name(&self) -> &'static str {
        "eliminate-true-filter"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::Filter { predicate } = plan.kind() else {
            return None;
        };
        if !predicate.is_constant_true() {
            return None;
        }
        Some(Arc::clone(plan.child(0)))
    }
}

pub struct MergeFilterScan;

impl OptimizerRule for MergeFilterScan {
    fn name(&self) -> &'static str {
        "merge-filter-scan"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::Filter { predicate } = plan.kind() else {
            return None;
        };
        let child = plan.child(0);
        let PlanKind::SeqScan {
            table_oid,
            table_name,
            predicate: existing,
        } = child.kind()
        else {
            return None;
        };

        let merged = match existing {
            Some(existing) => Expression::logic(
                LogicOp::And,
                Arc::clone(existing),
                Arc::clone(predicate),
            ),
            None => Arc::clone(predicate),
        };

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            vec![],
            PlanKind::SeqScan {
                table_oid: *table_oid,
                table_name: table_name.clone(),
                predicate: Some(merged),
            },
        ))
    }
}

pub struct MergeFilterNlj;

impl OptimizerRule for MergeFilterNlj {
    fn name(&self) -> &'static str {
        "merge-filter-nlj"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::Filter { predicate } = plan.kind() else {
            return None;
        };
        let child = plan.child(0);
        let PlanKind::NestedLoopJoin {
            join_type,
            predicate: condition,
        } = child.kind()
        else {
            return None;
        };
        // Folding a filter into a LEFT join's condition would turn
        // unmatched-row padding on and off; only inner joins are safe.
        if *join_type != JoinType::Inner {
            return None;
        }

        let left_columns = child.child(0).output_schema().column_count();
        let remapped = remap_to_join(predicate, left_columns);
        // A cross product carries `true` as its condition; conjoining that
        // would hide the equality from the join-selection rules.
        let merged = if condition.is_constant_true() {
            remapped
        } else {
            Expression::logic(LogicOp::And, Arc::clone(condition), remapped)
        };

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            child.children().to_vec(),
            PlanKind::NestedLoopJoin {
                join_type: *join_type,
                predicate: merged,
            },
        ))
    }
}

/// Rewrites single-tuple column refs (`#0.i` over the join's output) into
/// join-side refs: columns left of the boundary become `#0.i`, the rest
/// become `#1.(i - boundary)`.
fn remap_to_join(expr: &ExpressionRef, left_columns: usize) -> ExpressionRef {
    match expr.as_ref() {
        Expression::ColumnRef {
            col_idx,
            return_type,
            ..
        } => {
            if *col_idx < left_columns {
                Expression::column(0, *col_idx, *return_type)
            } else {
                Expression::column(1, *col_idx - left_columns, *return_type)
            }
        }
        Expression::Constant { .. } => Arc::clone(expr),
        Expression::Comparison { op, left, right } => Expression::comparison(
            *op,
            remap_to_join(left, left_columns),
            remap_to_join(right, left_columns),
        ),
        Expression::Arithmetic { op, left, right } => Expression::arithmetic(
            *op,
            remap_to_join(left, left_columns),
            remap_to_join(right, left_columns),
        ),
        Expression::Logic { op, left, right } => Expression::logic(
            *op,
            remap_to_join(left, left_columns),
            remap_to_join(right, left_columns),
        ),
        Expression::VectorDistance { metric, left, right } => Expression::vector_distance(
            *metric,
            remap_to_join(left, left_columns),
            remap_to_join(right, left_columns),
        ),
    }
}
