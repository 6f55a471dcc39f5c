//! # Rewrite Rules
//!
//! One module per rule family; `default_rules` returns them in the order
//! the optimizer applies them. Each rule matches a local plan shape and
//! rebuilds just that spine, leaving everything else shared.

mod filter;
mod index;
mod join;
mod projection;
mod topn;
mod vector;

pub use filter::{EliminateTrueFilter, MergeFilterNlj, MergeFilterScan};
pub use index::{OrderByIndexScan, PredicateIndexScan};
pub use join::{NljAsHashJoin, NljAsIndexJoin};
pub use projection::MergeProjection;
pub use topn::SortLimitAsTopN;
pub use vector::VectorIndexScanRule;

use super::OptimizerRule;

pub fn default_rules() -> Vec<Box<dyn OptimizerRule>> {
    vec![
        Box::new(EliminateTrueFilter),
        Box::new(MergeProjection),
        Box::new(MergeFilterScan),
        Box::new(MergeFilterNlj),
        Box::new(NljAsIndexJoin),
        Box::new(NljAsHashJoin),
        Box::new(PredicateIndexScan),
        Box::new(OrderByIndexScan),
        Box::new(VectorIndexScanRule),
        Box::new(SortLimitAsTopN),
    ]
}
