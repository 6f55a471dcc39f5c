//! # Tuples, Record Identifiers, Tuple Metadata
//!
//! A tuple is the byte-serialized form of a row, produced from a value
//! slice and the owning schema. Tuples are immutable once constructed;
//! updating a row is delete-then-insert at the heap level.
//!
//! ## Encoding
//!
//! ```text
//! +-------------+----------------------------------------------+
//! | null bitmap |  column payloads, in schema order             |
//! | ⌈n/8⌉ bytes |  fixed-width: little-endian                   |
//! |             |  varchar: u32 length + bytes                  |
//! |             |  vector:  u32 dimension + dimension * f64     |
//! +-------------+----------------------------------------------+
//! ```
//!
//! NULL columns occupy no payload bytes; decoding walks the columns in
//! order, consulting the bitmap. Serialize→deserialize is identity for
//! every schema (see tests).
//!
//! A tuple carries an optional [`Rid`] when it originates from a table
//! heap; the RID is stable for the tuple's lifetime in the heap.

use super::PageId;
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::types::{DataType, Schema, Value};
use eyre::Result;
use std::fmt;

/// Record identifier: which page, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u16,
}

impl Rid {
    pub const INVALID: Rid = Rid {
        page_id: super::INVALID_PAGE_ID,
        slot: 0,
    };

    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != super::INVALID_PAGE_ID
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.page_id, self.slot)
    }
}

/// Per-slot metadata: mutation timestamp and tombstone bit. The MVCC
/// collaborator owns the timestamp; the executor core only reads
/// `is_deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TupleMeta {
    pub ts: u64,
    pub is_deleted: bool,
}

/// Byte-serialized row with an optional origin RID.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    rid: Option<Rid>,
    data: Vec<u8>,
}

impl Tuple {
    /// Serializes `values` against `schema`. Tags must match the column
    /// types positionally (NULL matches anything); a vector value must
    /// have the column's declared dimension.
    pub fn from_values(values: &[Value], schema: &Schema) -> Result<Tuple> {
        if values.len() != schema.column_count() {
            engine_bail!(
                ErrorKind::SchemaMismatch,
                "expected {} values, got {}",
                schema.column_count(),
                values.len()
            );
        }

        let bitmap_len = schema.column_count().div_ceil(8);
        let mut data = vec![0u8; bitmap_len];

        for (idx, (value, column)) in values.iter().zip(schema.columns()).enumerate() {
            if value.is_null() {
                data[idx / 8] |= 1 << (idx % 8);
                continue;
            }
            if value.data_type() != Some(column.data_type()) {
                engine_bail!(
                    ErrorKind::TypeMismatch,
                    "column '{}' is {} but value is {:?}",
                    column.name(),
                    column.data_type(),
                    value.data_type()
                );
            }
            match value {
                Value::Boolean(b) => data.push(*b as u8),
                Value::TinyInt(v) => data.extend(v.to_le_bytes()),
                Value::SmallInt(v) => data.extend(v.to_le_bytes()),
                Value::Integer(v) => data.extend(v.to_le_bytes()),
                Value::BigInt(v) => data.extend(v.to_le_bytes()),
                Value::Decimal(v) => data.extend(v.to_le_bytes()),
                Value::Timestamp(v) => data.extend(v.to_le_bytes()),
                Value::Varchar(s) => {
                    data.extend((s.len() as u32).to_le_bytes());
                    data.extend(s.as_bytes());
                }
                Value::Vector(v) => {
                    if let Some(dim) = column.length() {
                        if v.len() != dim as usize {
                            engine_bail!(
                                ErrorKind::TypeMismatch,
                                "column '{}' holds {}-dimensional vectors, got {}",
                                column.name(),
                                dim,
                                v.len()
                            );
                        }
                    }
                    data.extend((v.len() as u32).to_le_bytes());
                    for x in v {
                        data.extend(x.to_le_bytes());
                    }
                }
                Value::Null => unreachable!(),
            }
        }

        Ok(Tuple { rid: None, data })
    }

    /// An empty tuple for evaluating constant expressions.
    pub fn empty() -> Tuple {
        Tuple {
            rid: None,
            data: Vec::new(),
        }
    }

    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = Some(rid);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn from_bytes(data: Vec<u8>) -> Tuple {
        Tuple { rid: None, data }
    }

    /// Deserializes the value of column `idx`.
    pub fn value_at(&self, schema: &Schema, idx: usize) -> Result<Value> {
        if idx >= schema.column_count() {
            engine_bail!(
                ErrorKind::Invariant,
                "column index {} out of range for schema {}",
                idx,
                schema
            );
        }
        let mut cursor = Cursor::new(&self.data, schema.column_count())?;
        for i in 0..idx {
            cursor.skip(schema.column(i).data_type(), i)?;
        }
        cursor.read(schema.column(idx).data_type(), idx)
    }

    /// Deserializes every column.
    pub fn values(&self, schema: &Schema) -> Result<Vec<Value>> {
        let mut cursor = Cursor::new(&self.data, schema.column_count())?;
        let mut out = Vec::with_capacity(schema.column_count());
        for (i, col) in schema.columns().iter().enumerate() {
            out.push(cursor.read(col.data_type(), i)?);
        }
        Ok(out)
    }

    /// Extracts the index key columns listed in `key_attrs`, re-serialized
    /// against `key_schema`.
    pub fn key_from_tuple(
        &self,
        schema: &Schema,
        key_schema: &Schema,
        key_attrs: &[usize],
    ) -> Result<Tuple> {
        let values = self.values(schema)?;
        let key_values: Vec<Value> = key_attrs.iter().map(|&i| values[i].clone()).collect();
        Tuple::from_values(&key_values, key_schema)
    }

    /// Renders this tuple as a row of display strings.
    pub fn to_string_row(&self, schema: &Schema) -> Result<Vec<String>> {
        Ok(self
            .values(schema)?
            .into_iter()
            .map(|v| v.to_string())
            .collect())
    }
}

/// Sequential decoder over a tuple's payload bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], column_count: usize) -> Result<Self> {
        let bitmap_len = column_count.div_ceil(8);
        if data.len() < bitmap_len {
            engine_bail!(
                ErrorKind::Invariant,
                "tuple payload shorter than its null bitmap"
            );
        }
        Ok(Self {
            data,
            pos: bitmap_len,
        })
    }

    fn is_null(&self, idx: usize) -> bool {
        self.data[idx / 8] & (1 << (idx % 8)) != 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            engine_bail!(ErrorKind::Invariant, "tuple payload truncated");
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn var_len(&mut self) -> Result<usize> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()) as usize)
    }

    fn skip(&mut self, data_type: DataType, idx: usize) -> Result<()> {
        if self.is_null(idx) {
            return Ok(());
        }
        match data_type {
            DataType::Varchar => {
                let len = self.var_len()?;
                self.take(len)?;
            }
            DataType::Vector => {
                let dim = self.var_len()?;
                self.take(dim * 8)?;
            }
            fixed => {
                self.take(fixed.fixed_width().unwrap())?;
            }
        }
        Ok(())
    }

    fn read(&mut self, data_type: DataType, idx: usize) -> Result<Value> {
        if self.is_null(idx) {
            return Ok(Value::Null);
        }
        Ok(match data_type {
            DataType::Boolean => Value::Boolean(self.take(1)?[0] != 0),
            DataType::TinyInt => Value::TinyInt(self.take(1)?[0] as i8),
            DataType::SmallInt => {
                Value::SmallInt(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
            }
            DataType::Integer => {
                Value::Integer(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
            }
            DataType::BigInt => {
                Value::BigInt(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
            }
            DataType::Decimal => {
                Value::Decimal(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
            }
            DataType::Timestamp => {
                Value::Timestamp(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
            }
            DataType::Varchar => {
                let len = self.var_len()?;
                let bytes = self.take(len)?;
                match std::str::from_utf8(bytes) {
                    Ok(s) => Value::Varchar(s.to_string()),
                    Err(_) => {
                        engine_bail!(ErrorKind::Invariant, "varchar payload is not UTF-8")
                    }
                }
            }
            DataType::Vector => {
                let dim = self.var_len()?;
                let mut v = Vec::with_capacity(dim);
                for _ in 0..dim {
                    v.push(f64::from_le_bytes(self.take(8)?.try_into().unwrap()));
                }
                Value::Vector(v)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn mixed_schema() -> Schema {
        Schema::new(vec![
            Column::new("flag", DataType::Boolean),
            Column::new("small", DataType::SmallInt),
            Column::new("id", DataType::Integer),
            Column::new("big", DataType::BigInt),
            Column::new("score", DataType::Decimal),
            Column::with_length("name", DataType::Varchar, 32),
            Column::with_length("embedding", DataType::Vector, 3),
        ])
    }

    fn mixed_values() -> Vec<Value> {
        vec![
            Value::Boolean(true),
            Value::SmallInt(-5),
            Value::Integer(42),
            Value::BigInt(1 << 40),
            Value::Decimal(2.75),
            Value::Varchar("alice".into()),
            Value::Vector(vec![1.0, -2.0, 0.5]),
        ]
    }

    #[test]
    fn round_trip_is_identity() {
        let schema = mixed_schema();
        let values = mixed_values();
        let tuple = Tuple::from_values(&values, &schema).unwrap();
        assert_eq!(tuple.values(&schema).unwrap(), values);
    }

    #[test]
    fn round_trip_with_nulls() {
        let schema = mixed_schema();
        let mut values = mixed_values();
        values[1] = Value::Null;
        values[5] = Value::Null;
        values[6] = Value::Null;

        let tuple = Tuple::from_values(&values, &schema).unwrap();
        assert_eq!(tuple.values(&schema).unwrap(), values);
    }

    #[test]
    fn value_at_walks_past_variable_columns() {
        let schema = Schema::new(vec![
            Column::with_length("name", DataType::Varchar, 32),
            Column::new("id", DataType::Integer),
        ]);
        let values = vec![Value::Varchar("xyzzy".into()), Value::Integer(9)];
        let tuple = Tuple::from_values(&values, &schema).unwrap();

        assert_eq!(tuple.value_at(&schema, 1).unwrap(), Value::Integer(9));
        assert_eq!(
            tuple.value_at(&schema, 0).unwrap(),
            Value::Varchar("xyzzy".into())
        );
    }

    #[test]
    fn wrong_arity_is_schema_mismatch() {
        let schema = mixed_schema();
        let err = Tuple::from_values(&[Value::Integer(1)], &schema).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(ErrorKind::SchemaMismatch)
        );
    }

    #[test]
    fn wrong_tag_is_type_mismatch() {
        let schema = Schema::new(vec![Column::new("id", DataType::Integer)]);
        let err = Tuple::from_values(&[Value::Varchar("no".into())], &schema).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn vector_dimension_is_enforced() {
        let schema = Schema::new(vec![Column::with_length("v", DataType::Vector, 3)]);
        let err =
            Tuple::from_values(&[Value::Vector(vec![1.0, 2.0])], &schema).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn key_from_tuple_projects_key_attrs() {
        let schema = mixed_schema();
        let tuple = Tuple::from_values(&mixed_values(), &schema).unwrap();

        let key_schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::with_length("name", DataType::Varchar, 32),
        ]);
        let key = tuple.key_from_tuple(&schema, &key_schema, &[2, 5]).unwrap();
        assert_eq!(
            key.values(&key_schema).unwrap(),
            vec![Value::Integer(42), Value::Varchar("alice".into())]
        );
    }
}
