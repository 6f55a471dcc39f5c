//! # Index Access Paths
//!
//! - `PredicateIndexScan`: a sequential scan whose pushed-down predicate
//!   is an equality between an indexed column and a constant becomes a
//!   point lookup on that index.
//! - `OrderByIndexScan`: a sort whose keys are an ascending prefix of an
//!   ordered index's key columns, over a bare scan of that table, reads
//!   the index in order instead of sorting.

use crate::expr::{ComparisonOp, Expression, ExpressionRef};
use crate::optimizer::{OptimizerContext, OptimizerRule};
use crate::plan::{PlanKind, PlanNode, PlanRef};
use crate::types::Value;
use std::sync::Arc;

/// Matches `#0.col = const` in either orientation.
fn column_constant_equality(expr: &ExpressionRef) -> Option<(usize, Value)> {
    let Expression::Comparison {
        op: ComparisonOp::Equal,
        left,
        right,
    } = expr.as_ref()
    else {
        return None;
    };
    match (left.as_column_ref(), right.as_constant()) {
        (Some((0, col)), Some(value)) => return Some((col, value.clone())),
        _ => {}
    }
    match (right.as_column_ref(), left.as_constant()) {
        (Some((0, col)), Some(value)) => Some((col, value.clone())),
        _ => None,
    }
}

pub struct PredicateIndexScan;

impl OptimizerRule for PredicateIndexScan {
    fn name(&self) -> &'static str {
        "predicate-index-scan"
    }

    fn apply(&self, plan: &PlanRef, ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::SeqScan {
            table_oid,
            table_name,
            predicate: Some(predicate),
        } = plan.kind()
        else {
            return None;
        };
        let (col, value) = column_constant_equality(predicate)?;

        let index = ctx
            .catalog()
            .table_indexes(table_name)
            .into_iter()
            .find(|info| !info.kind().is_vector() && info.key_attrs() == [col])?;

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            vec![],
            PlanKind::IndexScan {
                table_oid: *table_oid,
                index_name: index.name().to_string(),
                lookup_key: Some(vec![value]),
            },
        ))
    }
}

pub struct OrderByIndexScan;

impl OptimizerRule for OrderByIndexScan {
    fn name(&self) -> &'static str {
        "order-by-index-scan"
    }

    fn apply(&self, plan: &PlanRef, ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::Sort { order_bys } = plan.kind() else {
            return None;
        };
        let scan = plan.child(0);
        let PlanKind::SeqScan {
            table_oid,
            table_name,
            predicate: None,
        } = scan.kind()
        else {
            return None;
        };

        // Ascending bare column refs only.
        let mut sort_cols = Vec::with_capacity(order_bys.len());
        for (direction, expr) in order_bys {
            if direction.is_descending() {
                return None;
            }
            let (0, col) = expr.as_column_ref()? else {
                return None;
            };
            sort_cols.push(col);
        }

        let index = ctx.catalog().table_indexes(table_name).into_iter().find(|info| {
            info.kind().is_ordered()
                && info.key_attrs().len() >= sort_cols.len()
                && info.key_attrs()[..sort_cols.len()] == sort_cols[..]
        })?;

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            vec![],
            PlanKind::IndexScan {
                table_oid: *table_oid,
                index_name: index.name().to_string(),
                lookup_key: None,
            },
        ))
    }
}
