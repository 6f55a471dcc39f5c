//! # Join Selection
//!
//! - `NljAsIndexJoin`: a nested-loop join whose condition is a single
//!   `outer.x = inner.y` equality, with the inner side a bare sequential
//!   scan over a table carrying a key index on `y`, becomes an index
//!   probe per outer row.
//! - `NljAsHashJoin`: a condition that is a conjunction of cross-side
//!   equalities becomes a hash join keyed on those columns.
//!
//! The index-join rule runs first: where both match, one probe per outer
//! row beats building a hash table the statement will use once.

use crate::expr::{ComparisonOp, Expression, ExpressionRef};
use crate::optimizer::{OptimizerContext, OptimizerRule};
use crate::plan::{PlanKind, PlanNode, PlanRef};
use std::sync::Arc;

/// Splits `left = right` where the operands are column refs on opposite
/// join sides; the result is normalized to (outer key, inner key).
fn cross_side_equality(expr: &ExpressionRef) -> Option<(ExpressionRef, ExpressionRef)> {
    let Expression::Comparison {
        op: ComparisonOp::Equal,
        left,
        right,
    } = expr.as_ref()
    else {
        return None;
    };
    let (lt, _) = left.as_column_ref()?;
    let (rt, _) = right.as_column_ref()?;
    match (lt, rt) {
        (0, 1) => Some((Arc::clone(left), Arc::clone(right))),
        (1, 0) => Some((Arc::clone(right), Arc::clone(left))),
        _ => None,
    }
}

pub struct NljAsHashJoin;

impl OptimizerRule for NljAsHashJoin {
    fn name(&self) -> &'static str {
        "nlj-as-hash-join"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::NestedLoopJoin {
            join_type,
            predicate,
        } = plan.kind()
        else {
            return None;
        };

        let conjuncts = predicate.conjuncts();
        let mut left_keys = Vec::with_capacity(conjuncts.len());
        let mut right_keys = Vec::with_capacity(conjuncts.len());
        for conjunct in &conjuncts {
            let (l, r) = cross_side_equality(conjunct)?;
            left_keys.push(l);
            right_keys.push(r);
        }
        if left_keys.is_empty() {
            return None;
        }

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            plan.children().to_vec(),
            PlanKind::HashJoin {
                join_type: *join_type,
                left_keys,
                right_keys,
            },
        ))
    }
}

pub struct NljAsIndexJoin;

impl OptimizerRule for NljAsIndexJoin {
    fn name(&self) -> &'static str {
        "nlj-as-index-join"
    }

    fn apply(&self, plan: &PlanRef, ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::NestedLoopJoin {
            join_type,
            predicate,
        } = plan.kind()
        else {
            return None;
        };
        let (outer_key, inner_key) = cross_side_equality(predicate)?;

        let inner = plan.child(1);
        let PlanKind::SeqScan {
            table_oid,
            table_name,
            predicate: None,
        } = inner.kind()
        else {
            return None;
        };

        let (_, inner_col) = inner_key.as_column_ref()?;
        let index = ctx
            .catalog()
            .table_indexes(table_name)
            .into_iter()
            .find(|info| !info.kind().is_vector() && info.key_attrs() == [inner_col])?;

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            vec![Arc::clone(plan.child(0))],
            PlanKind::NestedIndexJoin {
                join_type: *join_type,
                table_oid: *table_oid,
                index_name: index.name().to_string(),
                key_expr: outer_key,
            },
        ))
    }
}
