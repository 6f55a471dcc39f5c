//! # Columns and Schemas
//!
//! A schema is an ordered sequence of columns. Schemas are value objects:
//! cloned cheaply (plans and executors share them behind `Arc`) and compared
//! structurally. Two schemas are *shape-equal* when their column types match
//! positionally, regardless of names; shape equality drives insert
//! validation and the merge-projection rewrite.

use super::DataType;
use std::fmt;

/// A single column: name, type tag, and an optional fixed length.
///
/// For vector columns `length` is the dimension, fixed at table-create
/// time and shared by every value in the column. For varchar it is the
/// declared maximum. Fixed-width types leave it unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    length: Option<u32>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            length: None,
        }
    }

    pub fn with_length(name: impl Into<String>, data_type: DataType, length: u32) -> Self {
        Self {
            name: name.into(),
            data_type,
            length: Some(length),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn length(&self) -> Option<u32> {
        self.length
    }

    /// Returns a copy of this column under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            data_type: self.data_type,
            length: self.length,
        }
    }
}

/// Ordered sequence of columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of the column with the given name, if unambiguous.
    /// Returns `None` both for unknown and for duplicated names; callers
    /// that need to distinguish use [`Schema::count_name`].
    pub fn try_col_idx(&self, name: &str) -> Option<usize> {
        let mut found = None;
        for (i, col) in self.columns.iter().enumerate() {
            if col.name == name {
                if found.is_some() {
                    return None;
                }
                found = Some(i);
            }
        }
        found
    }

    pub fn count_name(&self, name: &str) -> usize {
        self.columns.iter().filter(|c| c.name == name).count()
    }

    /// True when column types match positionally (names ignored).
    pub fn shape_equal(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.data_type == b.data_type)
    }

    /// Projects the columns at `attrs`, in order, into a new schema.
    pub fn project(&self, attrs: &[usize]) -> Schema {
        Schema::new(attrs.iter().map(|&i| self.columns[i].clone()).collect())
    }

    /// Returns this schema with every column prefixed as `prefix.column`.
    pub fn with_prefix(&self, prefix: &str) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| c.renamed(format!("{}.{}", prefix, c.name)))
                .collect(),
        )
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", col.name, col.data_type)?;
        }
        f.write_str(")")
    }
}
