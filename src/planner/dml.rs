//! # DML Planning
//!
//! INSERT plans its source (VALUES or SELECT) and validates positional
//! type equality against the target table before emitting the mutation
//! node. UPDATE compiles one target expression per column (the
//! assignment where one exists, an identity reference otherwise) so the
//! executor can rebuild the full row from the old one. All three mutation
//! plans output a single-column count row.

use super::Planner;
use crate::binder::{DeleteStatement, InsertStatement, UpdateStatement};
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::expr::{Expression, ExpressionRef};
use crate::plan::{PlanKind, PlanNode, PlanRef};
use crate::types::{Column, DataType, Schema};
use eyre::Result;
use std::sync::Arc;

fn count_schema(name: &str) -> Arc<Schema> {
    Arc::new(Schema::new(vec![Column::new(name, DataType::Integer)]))
}

impl<'a> Planner<'a> {
    pub(crate) fn plan_insert(&mut self, stmt: &InsertStatement) -> Result<PlanRef> {
        let table = self.catalog().table(&stmt.table)?;
        let source = self.plan_select(&stmt.source)?;

        if !source.output_schema().shape_equal(table.schema()) {
            engine_bail!(
                ErrorKind::SchemaMismatch,
                "insert source {} does not match table shape {}",
                source.output_schema(),
                table.schema()
            );
        }

        Ok(PlanNode::new(
            count_schema("__vexdb_internal.insert_rows"),
            vec![source],
            PlanKind::Insert {
                table_oid: table.oid(),
            },
        ))
    }

    pub(crate) fn plan_update(&mut self, stmt: &UpdateStatement) -> Result<PlanRef> {
        let table = self.catalog().table(&stmt.table)?;
        let mut scan = PlanNode::new(
            Arc::new(table.schema().with_prefix(&stmt.table)),
            vec![],
            PlanKind::SeqScan {
                table_oid: table.oid(),
                table_name: stmt.table.clone(),
                predicate: None,
            },
        );

        if let Some(predicate) = &stmt.predicate {
            let (_, expr) = self.plan_expression(predicate, &[&scan])?;
            scan = PlanNode::new(
                Arc::clone(scan.output_schema()),
                vec![scan],
                PlanKind::Filter { predicate: expr },
            );
        }

        // One expression per column of the target row.
        let mut target_exprs: Vec<ExpressionRef> = Vec::new();
        for (idx, column) in table.schema().columns().iter().enumerate() {
            let assignment = stmt
                .assignments
                .iter()
                .find(|(name, _)| name == column.name());
            let expr = match assignment {
                Some((_, bound)) => {
                    let (_, expr) = self.plan_expression(bound, &[&scan])?;
                    if expr.return_type() != column.data_type()
                        && expr.as_constant().map(|v| !v.is_null()).unwrap_or(true)
                    {
                        engine_bail!(
                            ErrorKind::TypeMismatch,
                            "assignment to '{}' has type {:?}, column is {}",
                            column.name(),
                            expr.return_type(),
                            column.data_type()
                        );
                    }
                    expr
                }
                None => Expression::column(0, idx, column.data_type()),
            };
            target_exprs.push(expr);
        }

        for (name, _) in &stmt.assignments {
            if table.schema().try_col_idx(name).is_none() {
                engine_bail!(
                    ErrorKind::SchemaMismatch,
                    "unknown column '{}' in UPDATE of '{}'",
                    name,
                    stmt.table
                );
            }
        }

        Ok(PlanNode::new(
            count_schema("__vexdb_internal.update_rows"),
            vec![scan],
            PlanKind::Update {
                table_oid: table.oid(),
                target_exprs,
            },
        ))
    }

    pub(crate) fn plan_delete(&mut self, stmt: &DeleteStatement) -> Result<PlanRef> {
        let table = self.catalog().table(&stmt.table)?;
        let mut scan = PlanNode::new(
            Arc::new(table.schema().with_prefix(&stmt.table)),
            vec![],
            PlanKind::SeqScan {
                table_oid: table.oid(),
                table_name: stmt.table.clone(),
                predicate: None,
            },
        );

        if let Some(predicate) = &stmt.predicate {
            let (_, expr) = self.plan_expression(predicate, &[&scan])?;
            scan = PlanNode::new(
                Arc::clone(scan.output_schema()),
                vec![scan],
                PlanKind::Filter { predicate: expr },
            );
        }

        Ok(PlanNode::new(
            count_schema("__vexdb_internal.delete_rows"),
            vec![scan],
            PlanKind::Delete {
                table_oid: table.oid(),
            },
        ))
    }
}
