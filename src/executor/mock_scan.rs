//! # Mock Scan
//!
//! Hard-coded tables for executor and optimizer tests. Any base table
//! whose name starts with `__mock` plans as a `MockScan`, bypassing the
//! catalog entirely. Rows are generated fresh per scan, so mock tables
//! behave as immutable fixtures.

use super::Executor;
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::plan::{PlanKind, PlanRef};
use crate::storage::{Rid, Tuple};
use crate::types::{Column, DataType, Schema, Value};
use eyre::Result;
use std::sync::Arc;

/// Schema of a mock table, unprefixed (the planner qualifies it).
pub fn mock_schema(name: &str) -> Result<Schema> {
    match name {
        "__mock_table_1" => Ok(Schema::new(vec![
            Column::new("colA", DataType::Integer),
            Column::new("colB", DataType::Integer),
        ])),
        "__mock_table_2" => Ok(Schema::new(vec![
            Column::with_length("name", DataType::Varchar, 32),
            Column::new("id", DataType::Integer),
        ])),
        other => engine_bail!(ErrorKind::NotFound, "mock table '{}' is not defined", other),
    }
}

pub fn mock_rows(name: &str) -> Result<Vec<Vec<Value>>> {
    match name {
        "__mock_table_1" => Ok((0..100)
            .map(|i| vec![Value::Integer(i), Value::Integer(i * 10)])
            .collect()),
        "__mock_table_2" => Ok((0..10)
            .map(|i| {
                vec![
                    Value::Varchar(format!("item-{}", i)),
                    Value::Integer(i),
                ]
            })
            .collect()),
        other => engine_bail!(ErrorKind::NotFound, "mock table '{}' is not defined", other),
    }
}

pub struct MockScanExecutor {
    schema: Arc<Schema>,
    rows: Vec<Vec<Value>>,
    cursor: usize,
}

impl MockScanExecutor {
    pub fn new(plan: &PlanRef) -> Result<MockScanExecutor> {
        let PlanKind::MockScan { table_name } = plan.kind() else {
            engine_bail!(ErrorKind::Invariant, "MockScanExecutor needs a MockScan plan");
        };
        Ok(MockScanExecutor {
            schema: Arc::clone(plan.output_schema()),
            rows: mock_rows(table_name)?,
            cursor: 0,
        })
    }
}

impl Executor for MockScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let tuple = Tuple::from_values(&self.rows[self.cursor], &self.schema)?;
        self.cursor += 1;
        Ok(Some((tuple, Rid::INVALID)))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
