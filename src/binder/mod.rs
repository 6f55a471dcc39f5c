//! # Bound Statement Contract
//!
//! Data-only sketch of what the out-of-scope parser/binder hands the
//! planner: statements whose names are resolved but whose column
//! references are still symbolic (`table.column` strings). The planner
//! turns these into positional plan expressions against child schemas.
//!
//! Nothing in this module lexes or parses; tests and embedders construct
//! these values directly through the small builder helpers.

use crate::types::Value;

/// Sort direction of one `ORDER BY` item. `Default` is what an
/// unannotated item binds to and sorts ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Default,
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn is_descending(&self) -> bool {
        matches!(self, OrderDirection::Desc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub ctes: Vec<Cte>,
    pub table: BoundTableRef,
    pub predicate: Option<BoundExpr>,
    pub group_by: Vec<BoundExpr>,
    pub having: Option<BoundExpr>,
    pub select_list: Vec<BoundExpr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<BoundExpr>,
    pub offset: Option<BoundExpr>,
    pub distinct: bool,
}

impl SelectStatement {
    /// A `SELECT *` over one table ref; callers fill in the clauses they
    /// need.
    pub fn from_table(table: BoundTableRef) -> SelectStatement {
        SelectStatement {
            ctes: Vec::new(),
            table,
            predicate: None,
            group_by: Vec::new(),
            having: None,
            select_list: vec![BoundExpr::Star],
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub select: Box<SelectStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub direction: OrderDirection,
    pub expr: BoundExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// `VALUES (...)` binds to a select over an expression list.
    pub source: Box<SelectStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<(String, BoundExpr)>,
    pub predicate: Option<BoundExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub predicate: Option<BoundExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundTableRef {
    /// `SELECT 1` with no FROM clause.
    Empty,
    BaseTable {
        table: String,
        alias: Option<String>,
    },
    Join {
        kind: JoinKind,
        left: Box<BoundTableRef>,
        right: Box<BoundTableRef>,
        condition: Option<BoundExpr>,
    },
    Subquery {
        select: Box<SelectStatement>,
        alias: String,
    },
    /// `VALUES (...), (...)` rows.
    ExpressionList { rows: Vec<Vec<BoundExpr>> },
}

impl BoundTableRef {
    pub fn base(table: impl Into<String>) -> BoundTableRef {
        BoundTableRef::BaseTable {
            table: table.into(),
            alias: None,
        }
    }

    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> BoundTableRef {
        BoundTableRef::BaseTable {
            table: table.into(),
            alias: Some(alias.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Constant(Value),
    ColumnRef {
        table: Option<String>,
        column: String,
    },
    Star,
    Alias {
        name: String,
        child: Box<BoundExpr>,
    },
    BinaryOp {
        op: String,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    FuncCall {
        name: String,
        args: Vec<BoundExpr>,
    },
    AggCall {
        name: String,
        distinct: bool,
        args: Vec<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn lit(value: Value) -> BoundExpr {
        BoundExpr::Constant(value)
    }

    pub fn col(column: impl Into<String>) -> BoundExpr {
        BoundExpr::ColumnRef {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified_col(table: impl Into<String>, column: impl Into<String>) -> BoundExpr {
        BoundExpr::ColumnRef {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    pub fn binary(op: impl Into<String>, left: BoundExpr, right: BoundExpr) -> BoundExpr {
        BoundExpr::BinaryOp {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn agg(name: impl Into<String>, args: Vec<BoundExpr>) -> BoundExpr {
        BoundExpr::AggCall {
            name: name.into(),
            distinct: false,
            args,
        }
    }

    pub fn aliased(self, name: impl Into<String>) -> BoundExpr {
        BoundExpr::Alias {
            name: name.into(),
            child: Box::new(self),
        }
    }

    /// The `table.column` display name a column ref binds under.
    pub fn column_name(&self) -> Option<String> {
        match self {
            BoundExpr::ColumnRef { table, column } => Some(match table {
                Some(t) => format!("{}.{}", t, column),
                None => column.clone(),
            }),
            BoundExpr::Alias { child, .. } => child.column_name(),
            _ => None,
        }
    }

    /// True when an aggregate call appears anywhere in this expression.
    pub fn has_aggregation(&self) -> bool {
        match self {
            BoundExpr::AggCall { .. } => true,
            BoundExpr::Alias { child, .. } => child.has_aggregation(),
            BoundExpr::BinaryOp { left, right, .. } => {
                left.has_aggregation() || right.has_aggregation()
            }
            BoundExpr::FuncCall { args, .. } => args.iter().any(|a| a.has_aggregation()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_include_the_table_qualifier() {
        assert_eq!(BoundExpr::col("a").column_name(), Some("a".to_string()));
        assert_eq!(
            BoundExpr::qualified_col("t", "a").column_name(),
            Some("t.a".to_string())
        );
        assert_eq!(BoundExpr::Star.column_name(), None);
    }

    #[test]
    fn aggregation_detection_walks_the_tree() {
        let plain = BoundExpr::binary("+", BoundExpr::col("a"), BoundExpr::col("b"));
        assert!(!plain.has_aggregation());

        let nested = BoundExpr::binary(
            "+",
            BoundExpr::col("g"),
            BoundExpr::agg("sum", vec![BoundExpr::col("v")]),
        );
        assert!(nested.has_aggregation());

        let aliased = BoundExpr::agg("count", vec![]).aliased("n");
        assert!(aliased.has_aggregation());
    }
}
