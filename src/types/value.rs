//! # Runtime Value Representation
//!
//! `Value` is the runtime representation for SQL values. Variants own their
//! payload: varchar owns its byte buffer (copy-on-construct) and vector owns
//! an ordered sequence of double-precision floats whose dimension is fixed
//! by the owning column.
//!
//! ## Comparison Semantics
//!
//! - NULL compared to anything returns `None` (SQL UNKNOWN)
//! - NaN compared to anything returns `None`
//! - Integer-family values promote to the wider operand; integers promote
//!   to `Decimal` when compared against one
//! - Any other cross-tag pair is a `TypeMismatch` contract violation at the
//!   expression layer; `compare` itself returns `None` for such pairs so
//!   sorting stays total via [`Value::compare_for_sort`]

use super::DataType;
use crate::error::ErrorKind;
use crate::engine_bail;
use eyre::Result;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Tagged SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Decimal(f64),
    Timestamp(u64),
    Varchar(String),
    Vector(Vec<f64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type tag, `None` for untyped NULL.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::TinyInt(_) => Some(DataType::TinyInt),
            Value::SmallInt(_) => Some(DataType::SmallInt),
            Value::Integer(_) => Some(DataType::Integer),
            Value::BigInt(_) => Some(DataType::BigInt),
            Value::Decimal(_) => Some(DataType::Decimal),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Varchar(_) => Some(DataType::Varchar),
            Value::Vector(_) => Some(DataType::Vector),
        }
    }

    /// Widens an integer-family value to i64, `None` for anything else.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens a numeric value to f64, `None` for anything else.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Decimal(v) => Some(*v),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Compares two values with SQL NULL semantics.
    /// Returns `None` if either value is NULL, NaN, or the tags are not
    /// comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,

            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Varchar(a), Value::Varchar(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),

            (Value::Decimal(a), Value::Decimal(b)) => float_cmp(*a, *b),
            (Value::Decimal(a), b) => float_cmp(*a, b.as_f64()?),
            (a, Value::Decimal(b)) => float_cmp(a.as_f64()?, *b),

            (Value::Vector(a), Value::Vector(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if x.is_nan() || y.is_nan() {
                        return None;
                    }
                    match x.partial_cmp(y) {
                        Some(Ordering::Equal) => continue,
                        other => return other,
                    }
                }
                Some(a.len().cmp(&b.len()))
            }

            (a, b) => {
                let (a, b) = (a.as_i64()?, b.as_i64()?);
                Some(a.cmp(&b))
            }
        }
    }

    /// Total ordering for sorting and index keys: NULL sorts before any
    /// non-NULL value, incomparable pairs collapse to Equal.
    pub fn compare_for_sort(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Binary arithmetic with integer-family promotion. A non-numeric
    /// operand or an unsupported tag pair is a `TypeMismatch`.
    pub fn arithmetic(&self, op: ArithmeticOp, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        match (self, other) {
            (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
                let (a, b) = match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => engine_bail!(
                        ErrorKind::TypeMismatch,
                        "cannot apply {} to {:?} and {:?}",
                        op,
                        self.data_type(),
                        other.data_type()
                    ),
                };
                if op == ArithmeticOp::Divide && b == 0.0 {
                    return Ok(Value::Null);
                }
                Ok(Value::Decimal(op.apply_f64(a, b)))
            }
            _ => {
                let (a, b) = match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => engine_bail!(
                        ErrorKind::TypeMismatch,
                        "cannot apply {} to {:?} and {:?}",
                        op,
                        self.data_type(),
                        other.data_type()
                    ),
                };
                if op == ArithmeticOp::Divide && b == 0 {
                    return Ok(Value::Null);
                }
                let result = op.apply_i64(a, b);
                // Results stay in the wider of the two operand tags.
                Ok(widen_int(
                    result,
                    wider_int_tag(self.data_type(), other.data_type()),
                ))
            }
        }
    }

    /// Feeds this value into a hasher, for grouping and hash joins.
    pub fn hash_to<H: Hasher>(&self, hasher: &mut H) {
        match self {
            Value::Null => 0u8.hash(hasher),
            Value::Boolean(b) => b.hash(hasher),
            // Integer-family values hash by their widened form so that
            // Integer(1) and BigInt(1) land in the same bucket.
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Integer(_) | Value::BigInt(_) => {
                self.as_i64().unwrap().hash(hasher)
            }
            Value::Decimal(f) => f.to_bits().hash(hasher),
            Value::Timestamp(t) => t.hash(hasher),
            Value::Varchar(s) => s.hash(hasher),
            Value::Vector(v) => {
                for f in v {
                    f.to_bits().hash(hasher);
                }
            }
        }
    }
}

fn float_cmp(a: f64, b: f64) -> Option<Ordering> {
    if a.is_nan() || b.is_nan() {
        None
    } else {
        a.partial_cmp(&b)
    }
}

fn wider_int_tag(a: Option<DataType>, b: Option<DataType>) -> DataType {
    fn rank(t: DataType) -> u8 {
        match t {
            DataType::TinyInt => 0,
            DataType::SmallInt => 1,
            DataType::Integer => 2,
            _ => 3,
        }
    }
    let a = a.unwrap_or(DataType::BigInt);
    let b = b.unwrap_or(DataType::BigInt);
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

fn widen_int(v: i64, tag: DataType) -> Value {
    match tag {
        DataType::TinyInt => Value::TinyInt(v as i8),
        DataType::SmallInt => Value::SmallInt(v as i16),
        DataType::Integer => Value::Integer(v as i32),
        _ => Value::BigInt(v),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    fn apply_i64(&self, a: i64, b: i64) -> i64 {
        match self {
            ArithmeticOp::Add => a.wrapping_add(b),
            ArithmeticOp::Subtract => a.wrapping_sub(b),
            ArithmeticOp::Multiply => a.wrapping_mul(b),
            ArithmeticOp::Divide => a / b,
        }
    }

    fn apply_f64(&self, a: f64, b: f64) -> f64 {
        match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide => a / b,
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::Varchar(s) => write!(f, "{}", s),
            Value::Vector(v) => {
                f.write_str("[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", x)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_comparison_is_unknown() {
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(1).compare(&Value::Null), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn integer_family_promotes_for_comparison() {
        assert_eq!(
            Value::TinyInt(3).compare(&Value::BigInt(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::SmallInt(2).compare(&Value::Integer(5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn integers_promote_to_decimal() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Decimal(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Decimal(3.0).compare(&Value::BigInt(3)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn nan_comparison_is_unknown() {
        assert_eq!(
            Value::Decimal(f64::NAN).compare(&Value::Decimal(1.0)),
            None
        );
    }

    #[test]
    fn incomparable_tags_are_unknown() {
        assert_eq!(
            Value::Integer(1).compare(&Value::Varchar("1".into())),
            None
        );
    }

    #[test]
    fn vector_comparison_is_lexicographic() {
        let a = Value::Vector(vec![1.0, 2.0]);
        let b = Value::Vector(vec![1.0, 3.0]);
        assert_eq!(a.compare(&b), Some(Ordering::Less));

        let short = Value::Vector(vec![1.0]);
        assert_eq!(short.compare(&a), Some(Ordering::Less));
    }

    #[test]
    fn sort_order_puts_null_first() {
        assert_eq!(
            Value::Null.compare_for_sort(&Value::Integer(-100)),
            Ordering::Less
        );
        assert_eq!(
            Value::Integer(0).compare_for_sort(&Value::Null),
            Ordering::Greater
        );
    }

    #[test]
    fn arithmetic_promotes_to_wider_tag() {
        let sum = Value::TinyInt(1)
            .arithmetic(ArithmeticOp::Add, &Value::Integer(2))
            .unwrap();
        assert_eq!(sum, Value::Integer(3));

        let prod = Value::Integer(4)
            .arithmetic(ArithmeticOp::Multiply, &Value::Decimal(0.5))
            .unwrap();
        assert_eq!(prod, Value::Decimal(2.0));
    }

    #[test]
    fn arithmetic_with_null_is_null() {
        let r = Value::Null
            .arithmetic(ArithmeticOp::Add, &Value::Integer(1))
            .unwrap();
        assert_eq!(r, Value::Null);
    }

    #[test]
    fn division_by_zero_is_null() {
        let r = Value::Integer(7)
            .arithmetic(ArithmeticOp::Divide, &Value::Integer(0))
            .unwrap();
        assert_eq!(r, Value::Null);
    }

    #[test]
    fn arithmetic_on_varchar_is_type_mismatch() {
        let err = Value::Varchar("x".into())
            .arithmetic(ArithmeticOp::Add, &Value::Integer(1))
            .unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(ErrorKind::TypeMismatch)
        );
    }

    #[test]
    fn hash_is_stable_across_integer_widths() {
        use std::collections::hash_map::DefaultHasher;

        let mut h1 = DefaultHasher::new();
        Value::Integer(42).hash_to(&mut h1);
        let mut h2 = DefaultHasher::new();
        Value::BigInt(42).hash_to(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }
}
