//! # Expression Tree
//!
//! Closed variant set dispatched by tag, no virtual hierarchy. Every
//! expression knows its output type and evaluates against a single tuple
//! (`eval`) or a pair of join sides (`eval_join`); a column reference
//! carries `(tuple_idx, col_idx)` where `tuple_idx` selects the left (0)
//! or right (1) side of a join.
//!
//! ## Three-Valued Logic
//!
//! Comparisons return `{true, false, NULL}`: NULL operands (and NaN)
//! compare to NULL, and NULL propagates through arithmetic, AND/OR (with
//! the usual absorption: `false AND NULL = false`, `true OR NULL = true`)
//! and vector distance. The filter executor drops anything that is not
//! exactly `true`.
//!
//! ## Vector Distance
//!
//! `VectorDistance` evaluates both children to vectors and runs the
//! configured kernel (cache-aware). A non-vector operand or a dimension
//! mismatch is a `TypeMismatch` failure, not a silent NULL.

use crate::engine_bail;
use crate::error::ErrorKind;
use crate::storage::Tuple;
use crate::types::{ArithmeticOp, DataType, Schema, Value};
use crate::vector::{self, VectorMetric};
use eyre::Result;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type ExpressionRef = Arc<Expression>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    fn matches(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `(tuple_idx, col_idx)`: column `col_idx` of join side `tuple_idx`.
    ColumnRef {
        tuple_idx: usize,
        col_idx: usize,
        return_type: DataType,
    },
    Constant {
        value: Value,
    },
    Comparison {
        op: ComparisonOp,
        left: ExpressionRef,
        right: ExpressionRef,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: ExpressionRef,
        right: ExpressionRef,
    },
    Logic {
        op: LogicOp,
        left: ExpressionRef,
        right: ExpressionRef,
    },
    VectorDistance {
        metric: VectorMetric,
        left: ExpressionRef,
        right: ExpressionRef,
    },
}

impl Expression {
    pub fn column(tuple_idx: usize, col_idx: usize, return_type: DataType) -> ExpressionRef {
        Arc::new(Expression::ColumnRef {
            tuple_idx,
            col_idx,
            return_type,
        })
    }

    pub fn constant(value: Value) -> ExpressionRef {
        Arc::new(Expression::Constant { value })
    }

    pub fn comparison(op: ComparisonOp, left: ExpressionRef, right: ExpressionRef) -> ExpressionRef {
        Arc::new(Expression::Comparison { op, left, right })
    }

    pub fn arithmetic(op: ArithmeticOp, left: ExpressionRef, right: ExpressionRef) -> ExpressionRef {
        Arc::new(Expression::Arithmetic { op, left, right })
    }

    pub fn logic(op: LogicOp, left: ExpressionRef, right: ExpressionRef) -> ExpressionRef {
        Arc::new(Expression::Logic { op, left, right })
    }

    pub fn vector_distance(
        metric: VectorMetric,
        left: ExpressionRef,
        right: ExpressionRef,
    ) -> ExpressionRef {
        Arc::new(Expression::VectorDistance { metric, left, right })
    }

    pub fn return_type(&self) -> DataType {
        match self {
            Expression::ColumnRef { return_type, .. } => *return_type,
            Expression::Constant { value } => value.data_type().unwrap_or(DataType::Integer),
            Expression::Comparison { .. } | Expression::Logic { .. } => DataType::Boolean,
            Expression::Arithmetic { left, right, .. } => {
                arithmetic_type(left.return_type(), right.return_type())
            }
            Expression::VectorDistance { .. } => DataType::Decimal,
        }
    }

    /// Evaluates against one tuple. Column references must have
    /// `tuple_idx == 0`.
    pub fn eval(&self, tuple: &Tuple, schema: &Schema) -> Result<Value> {
        match self {
            Expression::ColumnRef { col_idx, .. } => tuple.value_at(schema, *col_idx),
            Expression::Constant { value } => Ok(value.clone()),
            Expression::Comparison { op, left, right } => {
                compare(*op, &left.eval(tuple, schema)?, &right.eval(tuple, schema)?)
            }
            Expression::Arithmetic { op, left, right } => left
                .eval(tuple, schema)?
                .arithmetic(*op, &right.eval(tuple, schema)?),
            Expression::Logic { op, left, right } => {
                logic(*op, &left.eval(tuple, schema)?, &right.eval(tuple, schema)?)
            }
            Expression::VectorDistance { metric, left, right } => {
                distance(*metric, &left.eval(tuple, schema)?, &right.eval(tuple, schema)?)
            }
        }
    }

    /// Evaluates against a join pair; `tuple_idx` picks the side.
    pub fn eval_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> Result<Value> {
        match self {
            Expression::ColumnRef {
                tuple_idx, col_idx, ..
            } => match *tuple_idx {
                0 => left_tuple.value_at(left_schema, *col_idx),
                1 => right_tuple.value_at(right_schema, *col_idx),
                other => engine_bail!(
                    ErrorKind::Invariant,
                    "join column ref with tuple_idx {}",
                    other
                ),
            },
            Expression::Constant { value } => Ok(value.clone()),
            Expression::Comparison { op, left, right } => compare(
                *op,
                &left.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
                &right.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
            ),
            Expression::Arithmetic { op, left, right } => left
                .eval_join(left_tuple, left_schema, right_tuple, right_schema)?
                .arithmetic(
                    *op,
                    &right.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
                ),
            Expression::Logic { op, left, right } => logic(
                *op,
                &left.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
                &right.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
            ),
            Expression::VectorDistance { metric, left, right } => distance(
                *metric,
                &left.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
                &right.eval_join(left_tuple, left_schema, right_tuple, right_schema)?,
            ),
        }
    }

    /// The `(tuple_idx, col_idx)` pair when this is a bare column ref.
    pub fn as_column_ref(&self) -> Option<(usize, usize)> {
        match self {
            Expression::ColumnRef {
                tuple_idx, col_idx, ..
            } => Some((*tuple_idx, *col_idx)),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expression::Constant { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_constant_true(&self) -> bool {
        matches!(
            self,
            Expression::Constant {
                value: Value::Boolean(true)
            }
        )
    }

    /// Splits an AND tree into its conjuncts.
    pub fn conjuncts(self: &Arc<Self>) -> Vec<ExpressionRef> {
        match self.as_ref() {
            Expression::Logic {
                op: LogicOp::And,
                left,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            _ => vec![Arc::clone(self)],
        }
    }

    /// Conjoins expressions back into one predicate (`true` when empty).
    pub fn conjoin(mut exprs: Vec<ExpressionRef>) -> ExpressionRef {
        match exprs.len() {
            0 => Expression::constant(Value::Boolean(true)),
            1 => exprs.pop().unwrap(),
            _ => {
                let mut iter = exprs.into_iter();
                let first = iter.next().unwrap();
                iter.fold(first, |acc, e| Expression::logic(LogicOp::And, acc, e))
            }
        }
    }
}

fn arithmetic_type(left: DataType, right: DataType) -> DataType {
    if left == DataType::Decimal || right == DataType::Decimal {
        return DataType::Decimal;
    }
    fn rank(t: DataType) -> u8 {
        match t {
            DataType::TinyInt => 0,
            DataType::SmallInt => 1,
            DataType::Integer => 2,
            _ => 3,
        }
    }
    if rank(left) >= rank(right) {
        left
    } else {
        right
    }
}

fn compare(op: ComparisonOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match left.compare(right) {
        Some(ordering) => Ok(Value::Boolean(op.matches(ordering))),
        None => {
            // NaN involved, or genuinely incomparable tags.
            if comparable_tags(left, right) {
                Ok(Value::Null)
            } else {
                engine_bail!(
                    ErrorKind::TypeMismatch,
                    "cannot compare {:?} with {:?}",
                    left.data_type(),
                    right.data_type()
                )
            }
        }
    }
}

fn comparable_tags(left: &Value, right: &Value) -> bool {
    match (left.data_type(), right.data_type()) {
        (Some(a), Some(b)) => a == b || (a.is_numeric() && b.is_numeric()),
        _ => true,
    }
}

fn logic(op: LogicOp, left: &Value, right: &Value) -> Result<Value> {
    let as_tri = |v: &Value| -> Result<Option<bool>> {
        match v {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(*b)),
            other => engine_bail!(
                ErrorKind::TypeMismatch,
                "{:?} is not a boolean operand",
                other.data_type()
            ),
        }
    };
    let (l, r) = (as_tri(left)?, as_tri(right)?);
    let result = match op {
        LogicOp::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        LogicOp::Or => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(match result {
        Some(b) => Value::Boolean(b),
        None => Value::Null,
    })
}

fn distance(metric: VectorMetric, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let (Some(a), Some(b)) = (left.as_vector(), right.as_vector()) else {
        engine_bail!(
            ErrorKind::TypeMismatch,
            "vector distance over {:?} and {:?}",
            left.data_type(),
            right.data_type()
        );
    };
    if a.len() != b.len() {
        engine_bail!(
            ErrorKind::TypeMismatch,
            "vector dimensions disagree ({} vs {})",
            a.len(),
            b.len()
        );
    }
    Ok(Value::Decimal(vector::distance(a, b, metric)))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::ColumnRef {
                tuple_idx, col_idx, ..
            } => write!(f, "#{}.{}", tuple_idx, col_idx),
            Expression::Constant { value } => write!(f, "{}", value),
            Expression::Comparison { op, left, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            Expression::Arithmetic { op, left, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            Expression::Logic { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expression::VectorDistance { metric, left, right } => {
                write!(f, "{}({}, {})", metric, left, right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Integer),
        ])
    }

    fn row(a: i32, b: i32) -> Tuple {
        Tuple::from_values(&[Value::Integer(a), Value::Integer(b)], &schema()).unwrap()
    }

    #[test]
    fn column_ref_reads_the_right_column() {
        let expr = Expression::column(0, 1, DataType::Integer);
        assert_eq!(
            expr.eval(&row(1, 2), &schema()).unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn comparison_is_tri_valued() {
        let lt = Expression::comparison(
            ComparisonOp::LessThan,
            Expression::column(0, 0, DataType::Integer),
            Expression::constant(Value::Integer(5)),
        );
        assert_eq!(
            lt.eval(&row(3, 0), &schema()).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            lt.eval(&row(7, 0), &schema()).unwrap(),
            Value::Boolean(false)
        );

        let vs_null = Expression::comparison(
            ComparisonOp::Equal,
            Expression::column(0, 0, DataType::Integer),
            Expression::constant(Value::Null),
        );
        assert_eq!(vs_null.eval(&row(3, 0), &schema()).unwrap(), Value::Null);
    }

    #[test]
    fn incomparable_tags_fail() {
        let bad = Expression::comparison(
            ComparisonOp::Equal,
            Expression::constant(Value::Integer(1)),
            Expression::constant(Value::Varchar("1".into())),
        );
        let err = bad.eval(&Tuple::empty(), &Schema::default()).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn and_or_absorption() {
        let null = Expression::constant(Value::Null);
        let truth = Expression::constant(Value::Boolean(true));
        let falsity = Expression::constant(Value::Boolean(false));
        let empty = Schema::default();
        let unit = Tuple::empty();

        let false_and_null =
            Expression::logic(LogicOp::And, falsity.clone(), null.clone());
        assert_eq!(
            false_and_null.eval(&unit, &empty).unwrap(),
            Value::Boolean(false)
        );

        let true_or_null = Expression::logic(LogicOp::Or, truth.clone(), null.clone());
        assert_eq!(
            true_or_null.eval(&unit, &empty).unwrap(),
            Value::Boolean(true)
        );

        let true_and_null = Expression::logic(LogicOp::And, truth, null);
        assert_eq!(true_and_null.eval(&unit, &empty).unwrap(), Value::Null);
    }

    #[test]
    fn arithmetic_through_expressions() {
        let sum = Expression::arithmetic(
            ArithmeticOp::Add,
            Expression::column(0, 0, DataType::Integer),
            Expression::column(0, 1, DataType::Integer),
        );
        assert_eq!(
            sum.eval(&row(2, 3), &schema()).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(sum.return_type(), DataType::Integer);
    }

    #[test]
    fn eval_join_picks_sides() {
        let cond = Expression::comparison(
            ComparisonOp::Equal,
            Expression::column(0, 0, DataType::Integer),
            Expression::column(1, 1, DataType::Integer),
        );
        let left = row(4, 0);
        let right = row(9, 4);
        assert_eq!(
            cond.eval_join(&left, &schema(), &right, &schema()).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn vector_distance_evaluates_l2() {
        let dist = Expression::vector_distance(
            VectorMetric::L2,
            Expression::constant(Value::Vector(vec![0.0, 0.0])),
            Expression::constant(Value::Vector(vec![3.0, 4.0])),
        );
        assert_eq!(
            dist.eval(&Tuple::empty(), &Schema::default()).unwrap(),
            Value::Decimal(5.0)
        );
        assert_eq!(dist.return_type(), DataType::Decimal);
    }

    #[test]
    fn vector_distance_dimension_mismatch_fails() {
        let dist = Expression::vector_distance(
            VectorMetric::L2,
            Expression::constant(Value::Vector(vec![0.0])),
            Expression::constant(Value::Vector(vec![1.0, 2.0])),
        );
        let err = dist.eval(&Tuple::empty(), &Schema::default()).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn vector_distance_on_non_vector_fails() {
        let dist = Expression::vector_distance(
            VectorMetric::Cosine,
            Expression::constant(Value::Integer(1)),
            Expression::constant(Value::Vector(vec![1.0])),
        );
        let err = dist.eval(&Tuple::empty(), &Schema::default()).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn null_propagates_through_distance() {
        let dist = Expression::vector_distance(
            VectorMetric::L2,
            Expression::constant(Value::Null),
            Expression::constant(Value::Vector(vec![1.0])),
        );
        assert_eq!(
            dist.eval(&Tuple::empty(), &Schema::default()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn conjuncts_round_trip() {
        let a = Expression::comparison(
            ComparisonOp::Equal,
            Expression::column(0, 0, DataType::Integer),
            Expression::constant(Value::Integer(1)),
        );
        let b = Expression::comparison(
            ComparisonOp::GreaterThan,
            Expression::column(0, 1, DataType::Integer),
            Expression::constant(Value::Integer(2)),
        );
        let joined = Expression::conjoin(vec![a.clone(), b.clone()]);
        let parts = joined.conjuncts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], a);
        assert_eq!(parts[1], b);
    }
}
