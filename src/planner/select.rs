//! # SELECT Planning
//!
//! Mirrors the clause order of the statement: table ref, WHERE filter,
//! aggregation (or plain projection), DISTINCT as a group-by-everything
//! aggregation, ORDER BY, LIMIT. OFFSET is not implemented.
//!
//! ## Aggregation Rewrite
//!
//! Aggregate calls cannot be evaluated inside a projection, so planning
//! is two-phase: every `AggCall` in the select list and HAVING clause is
//! replaced by a reference to a pseudo-column `__pseudo_agg#N` while the
//! original calls are collected; an `Aggregation` node computes the
//! pseudo-columns (after the group keys), and HAVING/projection plan as
//! ordinary expressions over its output.

use super::expr::UNNAMED_COLUMN;
use super::Planner;
use crate::binder::{BoundExpr, SelectStatement};
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::expr::{Expression, ExpressionRef};
use crate::plan::{AggregationType, PlanKind, PlanNode, PlanRef};
use crate::types::{Column, DataType, Schema};
use eyre::Result;
use std::sync::Arc;

impl<'a> Planner<'a> {
    pub(crate) fn plan_select(&mut self, stmt: &SelectStatement) -> Result<PlanRef> {
        let ctes = &stmt.ctes;
        let mut plan = self.plan_table_ref(&stmt.table, ctes)?;

        if let Some(predicate) = &stmt.predicate {
            let (_, expr) = self.plan_expression(predicate, &[&plan])?;
            plan = PlanNode::new(
                Arc::clone(plan.output_schema()),
                vec![plan],
                PlanKind::Filter { predicate: expr },
            );
        }

        let has_agg = stmt.select_list.iter().any(|e| e.has_aggregation())
            || !stmt.group_by.is_empty()
            || stmt.having.is_some();

        plan = if has_agg {
            self.plan_select_agg(stmt, plan)?
        } else {
            self.plan_projection(&stmt.select_list, plan)?
        };

        if stmt.distinct {
            plan = plan_distinct(plan);
        }

        if !stmt.order_by.is_empty() {
            let mut order_bys = Vec::with_capacity(stmt.order_by.len());
            for item in &stmt.order_by {
                let (_, expr) = self.plan_expression(&item.expr, &[&plan])?;
                order_bys.push((item.direction, expr));
            }
            plan = PlanNode::new(
                Arc::clone(plan.output_schema()),
                vec![plan],
                PlanKind::Sort { order_bys },
            );
        }

        if stmt.offset.is_some() {
            engine_bail!(ErrorKind::NotImplemented, "OFFSET is not supported");
        }
        if let Some(limit) = &stmt.limit {
            let n = constant_limit(limit)?;
            plan = PlanNode::new(
                Arc::clone(plan.output_schema()),
                vec![plan],
                PlanKind::Limit { limit: n },
            );
        }

        Ok(plan)
    }

    fn plan_projection(
        &mut self,
        select_list: &[BoundExpr],
        child: PlanRef,
    ) -> Result<PlanRef> {
        let mut exprs: Vec<ExpressionRef> = Vec::new();
        let mut names: Vec<String> = Vec::new();

        for item in select_list {
            if matches!(item, BoundExpr::Star) {
                for (idx, col) in child.output_schema().columns().iter().enumerate() {
                    exprs.push(Expression::column(0, idx, col.data_type()));
                    names.push(col.name().to_string());
                }
                continue;
            }
            let (name, expr) = self.plan_expression(item, &[&child])?;
            names.push(if name == UNNAMED_COLUMN {
                self.fresh_unnamed()
            } else {
                name
            });
            exprs.push(expr);
        }

        let schema = infer_projection_schema(child.output_schema(), &names, &exprs);
        Ok(PlanNode::new(
            Arc::new(schema),
            vec![child],
            PlanKind::Projection { exprs },
        ))
    }

    fn plan_select_agg(
        &mut self,
        stmt: &SelectStatement,
        child: PlanRef,
    ) -> Result<PlanRef> {
        // Phase one: strip aggregate calls out of the clauses that will
        // run after the aggregation.
        let mut calls: Vec<BoundExpr> = Vec::new();
        let select_rewritten: Vec<BoundExpr> = stmt
            .select_list
            .iter()
            .map(|e| rewrite_agg_calls(e, &mut calls))
            .collect();
        let having_rewritten = stmt
            .having
            .as_ref()
            .map(|h| rewrite_agg_calls(h, &mut calls));

        if select_rewritten.iter().any(|e| matches!(e, BoundExpr::Star)) {
            engine_bail!(
                ErrorKind::NotImplemented,
                "SELECT * cannot be combined with aggregation"
            );
        }

        // Group keys come first in the aggregation output.
        let mut group_bys: Vec<ExpressionRef> = Vec::new();
        let mut columns: Vec<Column> = Vec::new();
        for group in &stmt.group_by {
            let (name, expr) = self.plan_expression(group, &[&child])?;
            let name = if name == UNNAMED_COLUMN {
                self.fresh_unnamed()
            } else {
                name
            };
            columns.push(column_for(child.output_schema(), &name, &expr));
            group_bys.push(expr);
        }

        let mut aggregates: Vec<ExpressionRef> = Vec::new();
        let mut agg_types: Vec<AggregationType> = Vec::new();
        for (n, call) in calls.iter().enumerate() {
            let BoundExpr::AggCall {
                name,
                distinct,
                args,
            } = call
            else {
                unreachable!("only agg calls are collected");
            };
            if *distinct {
                engine_bail!(
                    ErrorKind::NotImplemented,
                    "DISTINCT aggregate arguments are not supported"
                );
            }
            let (agg_type, arg) = match (name.as_str(), args.as_slice()) {
                ("count", []) | ("count_star", []) => (
                    AggregationType::CountStar,
                    Expression::constant(crate::types::Value::Integer(1)),
                ),
                ("count", [arg]) => {
                    (AggregationType::Count, self.plan_expression(arg, &[&child])?.1)
                }
                ("sum", [arg]) => {
                    (AggregationType::Sum, self.plan_expression(arg, &[&child])?.1)
                }
                ("min", [arg]) => {
                    (AggregationType::Min, self.plan_expression(arg, &[&child])?.1)
                }
                ("max", [arg]) => {
                    (AggregationType::Max, self.plan_expression(arg, &[&child])?.1)
                }
                (other, _) => engine_bail!(
                    ErrorKind::NotImplemented,
                    "aggregate function '{}' with {} arguments",
                    other,
                    args.len()
                ),
            };
            let output_type = match agg_type {
                AggregationType::CountStar | AggregationType::Count => DataType::Integer,
                _ => arg.return_type(),
            };
            columns.push(Column::new(format!("__pseudo_agg#{}", n), output_type));
            aggregates.push(arg);
            agg_types.push(agg_type);
        }

        let agg_plan = PlanNode::new(
            Arc::new(Schema::new(columns)),
            vec![child],
            PlanKind::Aggregation {
                group_bys,
                aggregates,
                agg_types,
            },
        );

        let mut plan = agg_plan;
        if let Some(having) = having_rewritten {
            let (_, expr) = self.plan_expression(&having, &[&plan])?;
            plan = PlanNode::new(
                Arc::clone(plan.output_schema()),
                vec![plan],
                PlanKind::Filter { predicate: expr },
            );
        }

        self.plan_projection(&select_rewritten, plan)
    }
}

/// DISTINCT as set-semantics grouping: group on every output column, no
/// aggregates; the output schema stays the child's.
fn plan_distinct(child: PlanRef) -> PlanRef {
    let group_bys: Vec<ExpressionRef> = child
        .output_schema()
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| Expression::column(0, idx, col.data_type()))
        .collect();
    PlanNode::new(
        Arc::clone(child.output_schema()),
        vec![child],
        PlanKind::Aggregation {
            group_bys,
            aggregates: vec![],
            agg_types: vec![],
        },
    )
}

fn rewrite_agg_calls(expr: &BoundExpr, calls: &mut Vec<BoundExpr>) -> BoundExpr {
    match expr {
        BoundExpr::AggCall { .. } => {
            let pseudo = BoundExpr::ColumnRef {
                table: None,
                column: format!("__pseudo_agg#{}", calls.len()),
            };
            calls.push(expr.clone());
            pseudo
        }
        BoundExpr::Alias { name, child } => BoundExpr::Alias {
            name: name.clone(),
            child: Box::new(rewrite_agg_calls(child, calls)),
        },
        BoundExpr::BinaryOp { op, left, right } => BoundExpr::BinaryOp {
            op: op.clone(),
            left: Box::new(rewrite_agg_calls(left, calls)),
            right: Box::new(rewrite_agg_calls(right, calls)),
        },
        BoundExpr::FuncCall { name, args } => BoundExpr::FuncCall {
            name: name.clone(),
            args: args.iter().map(|a| rewrite_agg_calls(a, calls)).collect(),
        },
        other => other.clone(),
    }
}

/// Column for a projected expression: bare column refs carry their source
/// column through (keeping the vector dimension), everything else gets a
/// fresh column of the expression's type.
fn column_for(child_schema: &Schema, name: &str, expr: &ExpressionRef) -> Column {
    match expr.as_column_ref() {
        Some((0, idx)) => child_schema.column(idx).renamed(name),
        _ => Column::new(name, expr.return_type()),
    }
}

fn infer_projection_schema(
    child_schema: &Schema,
    names: &[String],
    exprs: &[ExpressionRef],
) -> Schema {
    Schema::new(
        names
            .iter()
            .zip(exprs)
            .map(|(name, expr)| column_for(child_schema, name, expr))
            .collect(),
    )
}

fn constant_limit(expr: &BoundExpr) -> Result<usize> {
    let BoundExpr::Constant(value) = expr else {
        engine_bail!(
            ErrorKind::NotImplemented,
            "LIMIT must be an integer constant"
        );
    };
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n as usize),
        Some(n) => engine_bail!(ErrorKind::SchemaMismatch, "negative LIMIT {}", n),
        None => engine_bail!(
            ErrorKind::NotImplemented,
            "LIMIT must be an integer constant"
        ),
    }
}
