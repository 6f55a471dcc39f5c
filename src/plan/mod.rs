//! # Plan Tree
//!
//! Immutable, reference-counted plan nodes. Every node carries its output
//! schema and its children; the kind-specific payload lives in
//! [`PlanKind`]. The optimizer's bottom-up rewrites rebuild nodes with
//! [`PlanNode::clone_with_children`], sharing untouched subtrees through
//! `Arc` instead of deep-copying.
//!
//! ## Kinds
//!
//! Scans: `SeqScan` (optional pushed-down predicate), `IndexScan` (point
//! lookup or ordered full scan), `VectorIndexScan`, `MockScan`, `Values`.
//! Relational operators: `Filter`, `Projection`, `NestedLoopJoin`,
//! `HashJoin`, `NestedIndexJoin`, `Aggregation`, `Sort`, `Limit`, `TopN`.
//! Mutations: `Insert`, `Update`, `Delete` (each emits one count row).
//!
//! `explain()` renders the indented operator tree; the same string is
//! stable across repeated optimization, which the tests lean on.

use crate::binder::OrderDirection;
use crate::catalog::TableOid;
use crate::expr::ExpressionRef;
use crate::types::{Schema, Value};
use std::fmt::Write as _;
use std::sync::Arc;

pub type PlanRef = Arc<PlanNode>;

/// Join types the executor core implements. Right and full joins fail at
/// plan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

impl AggregationType {
    pub fn name(&self) -> &'static str {
        match self {
            AggregationType::CountStar => "count_star",
            AggregationType::Count => "count",
            AggregationType::Sum => "sum",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanKind {
    SeqScan {
        table_oid: TableOid,
        table_name: String,
        predicate: Option<ExpressionRef>,
    },
    IndexScan {
        table_oid: TableOid,
        index_name: String,
        /// Equality lookup key; `None` scans the whole index in key order.
        lookup_key: Option<Vec<Value>>,
    },
    VectorIndexScan {
        table_oid: TableOid,
        index_name: String,
        query: Vec<f64>,
        k: usize,
    },
    MockScan {
        table_name: String,
    },
    Values {
        rows: Vec<Vec<ExpressionRef>>,
    },
    Filter {
        predicate: ExpressionRef,
    },
    Projection {
        exprs: Vec<ExpressionRef>,
    },
    NestedLoopJoin {
        join_type: JoinType,
        predicate: ExpressionRef,
    },
    HashJoin {
        join_type: JoinType,
        left_keys: Vec<ExpressionRef>,
        right_keys: Vec<ExpressionRef>,
    },
    /// Probes an index on the inner table once per outer row. The single
    /// child is the outer side; the inner table is fetched by RID.
    NestedIndexJoin {
        join_type: JoinType,
        table_oid: TableOid,
        index_name: String,
        key_expr: ExpressionRef,
    },
    Aggregation {
        group_bys: Vec<ExpressionRef>,
        aggregates: Vec<ExpressionRef>,
        agg_types: Vec<AggregationType>,
    },
    Sort {
        order_bys: Vec<(OrderDirection, ExpressionRef)>,
    },
    Limit {
        limit: usize,
    },
    TopN {
        n: usize,
        order_bys: Vec<(OrderDirection, ExpressionRef)>,
    },
    Insert {
        table_oid: TableOid,
    },
    Update {
        table_oid: TableOid,
        /// One expression per target column, evaluated over the old row.
        target_exprs: Vec<ExpressionRef>,
    },
    Delete {
        table_oid: TableOid,
    },
}

impl PlanKind {
    pub fn name(&self) -> &'static str {
        match self {
            PlanKind::SeqScan { .. } => "SeqScan",
            PlanKind::IndexScan { .. } => "IndexScan",
            PlanKind::VectorIndexScan { .. } => "VectorIndexScan",
            PlanKind::MockScan { .. } => "MockScan",
            PlanKind::Values { .. } => "Values",
            PlanKind::Filter { .. } => "Filter",
            PlanKind::Projection { .. } => "Projection",
            PlanKind::NestedLoopJoin { .. } => "NestedLoopJoin",
            PlanKind::HashJoin { .. } => "HashJoin",
            PlanKind::NestedIndexJoin { .. } => "NestedIndexJoin",
            PlanKind::Aggregation { .. } => "Aggregation",
            PlanKind::Sort { .. } => "Sort",
            PlanKind::Limit { .. } => "Limit",
            PlanKind::TopN { .. } => "TopN",
            PlanKind::Insert { .. } => "Insert",
            PlanKind::Update { .. } => "Update",
            PlanKind::Delete { .. } => "Delete",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct PlanNode {
    schema: Arc<Schema>,
    children: Vec<PlanRef>,
    kind: PlanKind,
}

impl PlanNode {
    pub fn new(schema: Arc<Schema>, children: Vec<PlanRef>, kind: PlanKind) -> PlanRef {
        Arc::new(PlanNode {
            schema,
            children,
            kind,
        })
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn children(&self) -> &[PlanRef] {
        &self.children
    }

    pub fn child(&self, idx: usize) -> &PlanRef {
        &self.children[idx]
    }

    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    /// Same node over different children. The payload and schema are
    /// cloned, untouched grandchildren stay shared.
    pub fn clone_with_children(&self, children: Vec<PlanRef>) -> PlanRef {
        PlanNode::new(Arc::clone(&self.schema), children, self.kind.clone())
    }

    /// Same node and children, different output schema. Used by the
    /// merge-projection rewrite, which adopts the projection's column
    /// names.
    pub fn with_schema(&self, schema: Arc<Schema>) -> PlanRef {
        PlanNode::new(schema, self.children.clone(), self.kind.clone())
    }

    /// Indented operator tree, one `-> Node` line each.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.format_into(0, &mut out);
        out
    }

    /// True when any node in this subtree matches the predicate.
    pub fn any_node(&self, pred: &dyn Fn(&PlanKind) -> bool) -> bool {
        pred(&self.kind) || self.children.iter().any(|c| c.any_node(pred))
    }

    fn format_into(&self, indent: usize, out: &mut String) {
        let prefix = "  ".repeat(indent);
        match &self.kind {
            PlanKind::SeqScan {
                table_name,
                predicate,
                ..
            } => match predicate {
                Some(p) => {
                    let _ = writeln!(out, "{}-> SeqScan on {} (filter={})", prefix, table_name, p);
                }
                None => {
                    let _ = writeln!(out, "{}-> SeqScan on {}", prefix, table_name);
                }
            },
            PlanKind::IndexScan {
                index_name,
                lookup_key,
                ..
            } => match lookup_key {
                Some(key) => {
                    let rendered: Vec<String> = key.iter().map(|v| v.to_string()).collect();
                    let _ = writeln!(
                        out,
                        "{}-> IndexScan using {} (key=[{}])",
                        prefix,
                        index_name,
                        rendered.join(",")
                    );
                }
                None => {
                    let _ = writeln!(out, "{}-> IndexScan using {} (ordered)", prefix, index_name);
                }
            },
            PlanKind::VectorIndexScan { index_name, k, .. } => {
                let _ = writeln!(
                    out,
                    "{}-> VectorIndexScan using {} (k={})",
                    prefix, index_name, k
                );
            }
            PlanKind::MockScan { table_name } => {
                let _ = writeln!(out, "{}-> MockScan on {}", prefix, table_name);
            }
            PlanKind::Values { rows } => {
                let _ = writeln!(out, "{}-> Values ({} rows)", prefix, rows.len());
            }
            PlanKind::Filter { predicate } => {
                let _ = writeln!(out, "{}-> Filter ({})", prefix, predicate);
            }
            PlanKind::Projection { exprs } => {
                let rendered: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                let _ = writeln!(out, "{}-> Projection [{}]", prefix, rendered.join(", "));
            }
            PlanKind::NestedLoopJoin {
                join_type,
                predicate,
            } => {
                let _ = writeln!(
                    out,
                    "{}-> NestedLoopJoin ({:?}, {})",
                    prefix, join_type, predicate
                );
            }
            PlanKind::HashJoin {
                join_type,
                left_keys,
                right_keys,
            } => {
                let l: Vec<String> = left_keys.iter().map(|e| e.to_string()).collect();
                let r: Vec<String> = right_keys.iter().map(|e| e.to_string()).collect();
                let _ = writeln!(
                    out,
                    "{}-> HashJoin ({:?}, [{}]=[{}])",
                    prefix,
                    join_type,
                    l.join(","),
                    r.join(",")
                );
            }
            PlanKind::NestedIndexJoin {
                join_type,
                index_name,
                key_expr,
                ..
            } => {
                let _ = writeln!(
                    out,
                    "{}-> NestedIndexJoin ({:?}, {} via {})",
                    prefix, join_type, key_expr, index_name
                );
            }
            PlanKind::Aggregation {
                group_bys,
                aggregates,
                agg_types,
            } => {
                let groups: Vec<String> = group_bys.iter().map(|e| e.to_string()).collect();
                let aggs: Vec<String> = agg_types
                    .iter()
                    .zip(aggregates)
                    .map(|(t, e)| format!("{}({})", t.name(), e))
                    .collect();
                let _ = writeln!(
                    out,
                    "{}-> Aggregation (group=[{}], aggs=[{}])",
                    prefix,
                    groups.join(","),
                    aggs.join(",")
                );
            }
            PlanKind::Sort { order_bys } => {
                let keys: Vec<String> = order_bys
                    .iter()
                    .map(|(d, e)| format!("{:?} {}", d, e))
                    .collect();
                let _ = writeln!(out, "{}-> Sort [{}]", prefix, keys.join(", "));
            }
            PlanKind::Limit { limit } => {
                let _ = writeln!(out, "{}-> Limit ({})", prefix, limit);
            }
            PlanKind::TopN { n, order_bys } => {
                let keys: Vec<String> = order_bys
                    .iter()
                    .map(|(d, e)| format!("{:?} {}", d, e))
                    .collect();
                let _ = writeln!(out, "{}-> TopN (n={}, [{}])", prefix, n, keys.join(", "));
            }
            PlanKind::Insert { table_oid } => {
                let _ = writeln!(out, "{}-> Insert (oid={})", prefix, table_oid);
            }
            PlanKind::Update { table_oid, .. } => {
                let _ = writeln!(out, "{}-> Update (oid={})", prefix, table_oid);
            }
            PlanKind::Delete { table_oid } => {
                let _ = writeln!(out, "{}-> Delete (oid={})", prefix, table_oid);
            }
        }
        for child in &self.children {
            child.format_into(indent + 1, out);
        }
    }
}
