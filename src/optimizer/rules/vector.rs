//! # Vector Index Scan Rewrite
//!
//! The core vector rule. The naive plan for
//!
//! ```sql
//! SELECT ... FROM t ORDER BY v <-> '[...]' LIMIT k
//! ```
//!
//! scans the whole table, evaluates the distance per row, sorts, and
//! keeps `k` rows. When `t` has a vector index on the distance column
//! whose metric matches the sort expression, the scan-sort-limit pipeline
//! collapses into a `VectorIndexScan(t, index, query, k)`.
//!
//! ## Matched Shapes
//!
//! - `Limit(k, Sort([(asc, dist)], SeqScan(t)))`
//! - `Limit(k, Sort([(asc, dist)], Projection(SeqScan(t))))`, where the
//!   distance column is traced through the projection; the projection is
//!   re-applied on top of the index scan, which carries the full row
//! - the same two with `Sort + Limit` already fused into `TopN`
//!
//! `dist` must be `distance(col, const)` (either operand order) with a
//! single ascending sort key.
//!
//! ## Session Gate
//!
//! `vector_index_method` picks which index kind the rewrite may use;
//! `none` (the default) suppresses it entirely. This doubles as the
//! tie-break when a column carries both an IVFFlat and an HNSW index.

use crate::config::VectorIndexMethod;
use crate::expr::{Expression, ExpressionRef};
use crate::index::IndexKind;
use crate::optimizer::{OptimizerContext, OptimizerRule};
use crate::plan::{PlanKind, PlanNode, PlanRef};
use crate::types::Value;
use crate::vector::VectorMetric;
use std::sync::Arc;

pub struct VectorIndexScanRule;

impl OptimizerRule for VectorIndexScanRule {
    fn name(&self) -> &'static str {
        "vector-index-scan"
    }

    fn apply(&self, plan: &PlanRef, ctx: &OptimizerContext) -> Option<PlanRef> {
        let wanted_kind = match ctx.config().vector_index_method {
            VectorIndexMethod::None => return None,
            VectorIndexMethod::IvfFlat => IndexKind::IvfFlat,
            VectorIndexMethod::Hnsw => IndexKind::Hnsw,
        };

        // Unfuse the two accepted top shapes into (k, sort keys, input).
        let (k, order_bys, input) = match plan.kind() {
            PlanKind::Limit { limit } => {
                let sort = plan.child(0);
                let PlanKind::Sort { order_bys } = sort.kind() else {
                    return None;
                };
                (*limit, order_bys, Arc::clone(sort.child(0)))
            }
            PlanKind::TopN { n, order_bys } => (*n, order_bys, Arc::clone(plan.child(0))),
            _ => return None,
        };

        let [(direction, sort_expr)] = order_bys.as_slice() else {
            return None;
        };
        if direction.is_descending() {
            return None;
        }
        let (metric, dist_col, query) = distance_pattern(sort_expr)?;

        // The distance may be computed over a projection of the scan;
        // trace the column down to the base table in that case.
        let (scan, projection, base_col) = match input.kind() {
            PlanKind::SeqScan { predicate: None, .. } => (Arc::clone(&input), None, dist_col),
            PlanKind::Projection { exprs } => {
                let scan = Arc::clone(input.child(0));
                let PlanKind::SeqScan { predicate: None, .. } = scan.kind() else {
                    return None;
                };
                let (0, base_col) = exprs.get(dist_col)?.as_column_ref()? else {
                    return None;
                };
                let proj_schema = Arc::clone(input.output_schema());
                (scan, Some((proj_schema, exprs.clone())), base_col)
            }
            _ => return None,
        };
        let PlanKind::SeqScan {
            table_oid,
            table_name,
            ..
        } = scan.kind()
        else {
            return None;
        };

        let index = ctx
            .catalog()
            .table_indexes(table_name)
            .into_iter()
            .find(|info| {
                info.kind() == wanted_kind
                    && info.key_attrs() == [base_col]
                    && info.metric() == Some(metric)
            })?;

        // The scan carries the full row by RID, so projections above stay
        // valid unchanged.
        let index_scan = PlanNode::new(
            Arc::clone(scan.output_schema()),
            vec![],
            PlanKind::VectorIndexScan {
                table_oid: *table_oid,
                index_name: index.name().to_string(),
                query,
                k,
            },
        );

        Some(match projection {
            Some((proj_schema, exprs)) => PlanNode::new(
                proj_schema,
                vec![index_scan],
                PlanKind::Projection { exprs },
            ),
            None => index_scan,
        })
    }
}

/// Matches `distance(col, const-vector)` in either operand order,
/// returning the metric, the column index, and the query vector.
fn distance_pattern(expr: &ExpressionRef) -> Option<(VectorMetric, usize, Vec<f64>)> {
    let Expression::VectorDistance { metric, left, right } = expr.as_ref() else {
        return None;
    };

    let as_query = |e: &ExpressionRef| match e.as_constant() {
        Some(Value::Vector(v)) => Some(v.clone()),
        _ => None,
    };
    let as_col = |e: &ExpressionRef| match e.as_column_ref() {
        Some((0, col)) => Some(col),
        _ => None,
    };

    if let (Some(col), Some(query)) = (as_col(left), as_query(right)) {
        return Some((*metric, col, query));
    }
    if let (Some(col), Some(query)) = (as_col(right), as_query(left)) {
        return Some((*metric, col, query));
    }
    None
}
