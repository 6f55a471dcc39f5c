//! # Sort + Limit Fusion
//!
//! `Limit(n, Sort(keys, x))` buffers and fully sorts the child only to
//! throw away everything past row `n`; the fused `TopN(n, keys, x)`
//! keeps a bounded buffer instead.

use crate::optimizer::{OptimizerContext, OptimizerRule};
use crate::plan::{PlanKind, PlanNode, PlanRef};
use std::sync::Arc;

pub struct SortLimitAsTopN;

impl OptimizerRule for SortLimitAsTopN {
    fn name(&self) -> &'static str {
        "sort-limit-as-topn"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
        let PlanKind::Limit { limit } = plan.kind() else {
            return None;
        };
        let sort = plan.child(0);
        let PlanKind::Sort { order_bys } = sort.kind() else {
            return None;
        };

        Some(PlanNode::new(
            Arc::clone(plan.output_schema()),
            sort.children().to_vec(),
            PlanKind::TopN {
                n: *limit,
                order_bys: order_bys.clone(),
            },
        ))
    }
}
