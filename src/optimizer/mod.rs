//! # Rule-Based Optimizer
//!
//! Ordered rewrite rules over the plan tree, applied bottom-up to a fixed
//! point. Every rule is a pure function `plan -> Option<plan>`: `None`
//! means "does not apply here" and the subtree is left untouched, so the
//! optimizer never raises. Catalog lookups that fail inside a rule simply
//! make the rule inapplicable.
//!
//! ## Rule Order
//!
//! 1. eliminate-true-filter
//! 2. merge-projection
//! 3. merge-filter-scan
//! 4. merge-filter-nlj
//! 5. nlj-as-index-join (runs before the hash-join rule; a single
//!    equality over an indexed inner table prefers the index probe)
//! 6. nlj-as-hash-join
//! 7. predicate-index-scan
//! 8. order-by-index-scan
//! 9. vector-index-scan (matches both the `Limit + Sort` shape and the
//!    already-fused `TopN`)
//! 10. sort-limit-as-topn
//!
//! ## Termination
//!
//! Rules are idempotent on their domain; the fixed-point loop is still
//! capped at 16 passes and warns on stderr if the cap is hit, which would
//! indicate a rule pair oscillating.

pub mod rules;

use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::plan::PlanRef;
use std::sync::Arc;

const MAX_PASSES: usize = 16;

pub struct OptimizerContext<'a> {
    catalog: &'a Catalog,
    config: SessionConfig,
}

impl<'a> OptimizerContext<'a> {
    pub fn new(catalog: &'a Catalog, config: SessionConfig) -> OptimizerContext<'a> {
        OptimizerContext { catalog, config }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

pub trait OptimizerRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrites the node rooted at `plan`, or `None` when inapplicable.
    /// Called on every node, bottom-up.
    fn apply(&self, plan: &PlanRef, ctx: &OptimizerContext) -> Option<PlanRef>;
}

pub struct Optimizer<'a> {
    rules: Vec<Box<dyn OptimizerRule>>,
    ctx: OptimizerContext<'a>,
}

impl<'a> Optimizer<'a> {
    pub fn new(catalog: &'a Catalog, config: SessionConfig) -> Optimizer<'a> {
        Optimizer {
            rules: rules::default_rules(),
            ctx: OptimizerContext::new(catalog, config),
        }
    }

    pub fn with_rules(
        catalog: &'a Catalog,
        config: SessionConfig,
        rules: Vec<Box<dyn OptimizerRule>>,
    ) -> Optimizer<'a> {
        Optimizer {
            rules,
            ctx: OptimizerContext::new(catalog, config),
        }
    }

    pub fn optimize(&self, plan: &PlanRef) -> PlanRef {
        let mut current = Arc::clone(plan);

        for pass in 0..MAX_PASSES {
            let mut changed = false;
            for rule in &self.rules {
                if let Some(rewritten) = apply_bottom_up(&current, &self.ctx, rule.as_ref()) {
                    current = rewritten;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            if pass == MAX_PASSES - 1 {
                eprintln!(
                    "[warn] optimizer reached {} passes without converging",
                    MAX_PASSES
                );
            }
        }

        current
    }
}

/// Applies a rule to every node, children first, rebuilding the spine of
/// changed nodes and sharing untouched subtrees. Returns `None` when the
/// whole tree is unchanged.
fn apply_bottom_up(
    plan: &PlanRef,
    ctx: &OptimizerContext,
    rule: &dyn OptimizerRule,
) -> Option<PlanRef> {
    let mut changed = false;
    let mut children = Vec::with_capacity(plan.children().len());
    for child in plan.children() {
        match apply_bottom_up(child, ctx, rule) {
            Some(rewritten) => {
                changed = true;
                children.push(rewritten);
            }
            None => children.push(Arc::clone(child)),
        }
    }

    let node = if changed {
        plan.clone_with_children(children)
    } else {
        Arc::clone(plan)
    };

    match rule.apply(&node, ctx) {
        Some(rewritten) => Some(rewritten),
        None if changed => Some(node),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanKind, PlanNode};
    use crate::storage::BufferPool;
    use crate::types::Schema;

    struct NoOpRule;

    impl OptimizerRule for NoOpRule {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn apply(&self, _plan: &PlanRef, _ctx: &OptimizerContext) -> Option<PlanRef> {
            None
        }
    }

    #[test]
    fn noop_rules_share_the_input_tree() {
        let catalog = Catalog::new(Arc::new(BufferPool::new()));
        let optimizer =
            Optimizer::with_rules(&catalog, SessionConfig::default(), vec![Box::new(NoOpRule)]);

        let plan = PlanNode::new(
            Arc::new(Schema::default()),
            vec![],
            PlanKind::Values { rows: vec![] },
        );
        let optimized = optimizer.optimize(&plan);
        assert!(Arc::ptr_eq(&plan, &optimized));
    }
}
