//! # Expression Planning
//!
//! Resolves bound expressions against the output schemas of the child
//! plans. With one child, a column reference becomes `#0.idx`; with two
//! (join planning) the sides are probed in order and `tuple_idx` records
//! which one matched. Both unknown and ambiguous columns are schema
//! errors, matching the binder contract that names were already resolved
//! to real tables.

use super::Planner;
use crate::binder::BoundExpr;
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::expr::{ComparisonOp, Expression, ExpressionRef, LogicOp};
use crate::plan::PlanRef;
use crate::types::{ArithmeticOp, Schema};
use crate::vector::VectorMetric;
use eyre::Result;

pub(crate) const UNNAMED_COLUMN: &str = "<unnamed>";

impl<'a> Planner<'a> {
    /// Plans one bound expression, returning its output name (for
    /// projection schemas) and the plan expression.
    pub(crate) fn plan_expression(
        &mut self,
        bound: &BoundExpr,
        children: &[&PlanRef],
    ) -> Result<(String, ExpressionRef)> {
        match bound {
            BoundExpr::Constant(value) => Ok((
                UNNAMED_COLUMN.to_string(),
                Expression::constant(value.clone()),
            )),
            BoundExpr::ColumnRef { .. } => self.plan_column_ref(bound, children),
            BoundExpr::BinaryOp { op, left, right } => {
                let (_, l) = self.plan_expression(left, children)?;
                let (_, r) = self.plan_expression(right, children)?;
                Ok((UNNAMED_COLUMN.to_string(), binary_from_op(op, l, r)?))
            }
            BoundExpr::FuncCall { name, args } => {
                let mut planned = Vec::with_capacity(args.len());
                for arg in args {
                    planned.push(self.plan_expression(arg, children)?.1);
                }
                Ok((UNNAMED_COLUMN.to_string(), func_call(name, planned)?))
            }
            BoundExpr::Alias { name, child } => {
                let (_, expr) = self.plan_expression(child, children)?;
                Ok((name.clone(), expr))
            }
            BoundExpr::AggCall { name, .. } => engine_bail!(
                ErrorKind::Invariant,
                "aggregate call '{}' survived outside aggregation planning",
                name
            ),
            BoundExpr::Star => engine_bail!(
                ErrorKind::Invariant,
                "star is expanded by select planning, not expression planning"
            ),
        }
    }

    fn plan_column_ref(
        &mut self,
        bound: &BoundExpr,
        children: &[&PlanRef],
    ) -> Result<(String, ExpressionRef)> {
        let name = bound
            .column_name()
            .expect("plan_column_ref called on a column ref");

        match children {
            [] => engine_bail!(
                ErrorKind::Invariant,
                "column '{}' referenced without input",
                name
            ),
            [child] => {
                let idx = resolve_column(child.output_schema(), &name)?;
                let column = child.output_schema().column(idx);
                Ok((
                    column.name().to_string(),
                    Expression::column(0, idx, column.data_type()),
                ))
            }
            [left, right] => {
                let in_left = try_resolve_column(left.output_schema(), &name)?;
                let in_right = try_resolve_column(right.output_schema(), &name)?;
                match (in_left, in_right) {
                    (Some(_), Some(_)) => engine_bail!(
                        ErrorKind::SchemaMismatch,
                        "column '{}' is ambiguous across join sides",
                        name
                    ),
                    (Some(idx), None) => {
                        let column = left.output_schema().column(idx);
                        Ok((
                            column.name().to_string(),
                            Expression::column(0, idx, column.data_type()),
                        ))
                    }
                    (None, Some(idx)) => {
                        let column = right.output_schema().column(idx);
                        Ok((
                            column.name().to_string(),
                            Expression::column(1, idx, column.data_type()),
                        ))
                    }
                    (None, None) => engine_bail!(
                        ErrorKind::SchemaMismatch,
                        "column '{}' not found on either join side",
                        name
                    ),
                }
            }
            _ => engine_bail!(
                ErrorKind::Invariant,
                "expressions see at most two children"
            ),
        }
    }
}

/// Exact name match first, then unique suffix match (`a` resolves to
/// `t.a` when only one table exposes an `a`).
fn try_resolve_column(schema: &Schema, name: &str) -> Result<Option<usize>> {
    if let Some(idx) = schema.try_col_idx(name) {
        return Ok(Some(idx));
    }
    if schema.count_name(name) > 1 {
        engine_bail!(ErrorKind::SchemaMismatch, "column '{}' is ambiguous", name);
    }

    let suffix = format!(".{}", name);
    let mut found = None;
    for (idx, col) in schema.columns().iter().enumerate() {
        if col.name().ends_with(&suffix) {
            if found.is_some() {
                engine_bail!(ErrorKind::SchemaMismatch, "column '{}' is ambiguous", name);
            }
            found = Some(idx);
        }
    }
    Ok(found)
}

fn resolve_column(schema: &Schema, name: &str) -> Result<usize> {
    match try_resolve_column(schema, name)? {
        Some(idx) => Ok(idx),
        None => engine_bail!(ErrorKind::SchemaMismatch, "column '{}' not found", name),
    }
}

fn binary_from_op(
    op: &str,
    left: ExpressionRef,
    right: ExpressionRef,
) -> Result<ExpressionRef> {
    let expr = match op {
        "=" => Expression::comparison(ComparisonOp::Equal, left, right),
        "<>" | "!=" => Expression::comparison(ComparisonOp::NotEqual, left, right),
        "<" => Expression::comparison(ComparisonOp::LessThan, left, right),
        "<=" => Expression::comparison(ComparisonOp::LessThanOrEqual, left, right),
        ">" => Expression::comparison(ComparisonOp::GreaterThan, left, right),
        ">=" => Expression::comparison(ComparisonOp::GreaterThanOrEqual, left, right),
        "+" => Expression::arithmetic(ArithmeticOp::Add, left, right),
        "-" => Expression::arithmetic(ArithmeticOp::Subtract, left, right),
        "*" => Expression::arithmetic(ArithmeticOp::Multiply, left, right),
        "/" => Expression::arithmetic(ArithmeticOp::Divide, left, right),
        "and" | "AND" => Expression::logic(LogicOp::And, left, right),
        "or" | "OR" => Expression::logic(LogicOp::Or, left, right),
        // pgvector-style distance operators.
        "<->" => Expression::vector_distance(VectorMetric::L2, left, right),
        "<#>" => Expression::vector_distance(VectorMetric::InnerProduct, left, right),
        "<=>" => Expression::vector_distance(VectorMetric::Cosine, left, right),
        other => engine_bail!(ErrorKind::NotImplemented, "binary operator '{}'", other),
    };
    Ok(expr)
}

fn func_call(name: &str, mut args: Vec<ExpressionRef>) -> Result<ExpressionRef> {
    let metric = match name {
        "l2_dist" => VectorMetric::L2,
        "inner_product" => VectorMetric::InnerProduct,
        "cosine_similarity" => VectorMetric::Cosine,
        other => engine_bail!(ErrorKind::NotImplemented, "function '{}'", other),
    };
    if args.len() != 2 {
        engine_bail!(
            ErrorKind::SchemaMismatch,
            "{} takes two arguments, got {}",
            name,
            args.len()
        );
    }
    let right = args.pop().unwrap();
    let left = args.pop().unwrap();
    Ok(Expression::vector_distance(metric, left, right))
}
