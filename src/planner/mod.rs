//! # Planner
//!
//! Turns bound statements into plan trees. Planning is purely structural:
//! names resolve against child plan schemas, aggregate calls rewrite into
//! pseudo-columns, and every produced node carries its output schema. No
//! costing happens here; the optimizer rewrites the tree afterwards.
//!
//! ## Module Structure
//!
//! - `select`: SELECT planning (filter, aggregation, distinct, sort, limit)
//! - `expr`: bound expression -> plan expression resolution
//! - `dml`: INSERT / UPDATE / DELETE planning
//!
//! ## Naming
//!
//! Scan output columns are qualified (`alias.column`), so unqualified
//! bound references resolve by suffix match and ambiguity is detected by
//! counting candidates. Unnamed projection columns get `__unnamed#N`
//! names; rewritten aggregate calls get `__pseudo_agg#N`.

mod dml;
mod expr;
mod select;

use crate::binder::{BoundStatement, BoundTableRef, Cte, JoinKind};
use crate::catalog::Catalog;
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::executor::mock_scan;
use crate::expr::Expression;
use crate::plan::{JoinType, PlanKind, PlanNode, PlanRef};
use crate::types::{Column, Schema, Value};
use eyre::Result;
use std::sync::Arc;

pub struct Planner<'a> {
    catalog: &'a Catalog,
    next_unnamed: usize,
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog) -> Planner<'a> {
        Planner {
            catalog,
            next_unnamed: 0,
        }
    }

    pub fn plan(&mut self, statement: &BoundStatement) -> Result<PlanRef> {
        match statement {
            BoundStatement::Select(select) => self.plan_select(select),
            BoundStatement::Insert(insert) => self.plan_insert(insert),
            BoundStatement::Update(update) => self.plan_update(update),
            BoundStatement::Delete(delete) => self.plan_delete(delete),
        }
    }

    pub(crate) fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub(crate) fn fresh_unnamed(&mut self) -> String {
        let name = format!("__unnamed#{}", self.next_unnamed);
        self.next_unnamed += 1;
        name
    }

    pub(crate) fn plan_table_ref(
        &mut self,
        table_ref: &BoundTableRef,
        ctes: &[Cte],
    ) -> Result<PlanRef> {
        match table_ref {
            BoundTableRef::Empty => {
                // One empty row, so constant select lists emit once.
                Ok(PlanNode::new(
                    Arc::new(Schema::default()),
                    vec![],
                    PlanKind::Values {
                        rows: vec![vec![]],
                    },
                ))
            }
            BoundTableRef::BaseTable { table, alias } => {
                self.plan_base_table(table, alias.as_deref(), ctes)
            }
            BoundTableRef::Join {
                kind,
                left,
                right,
                condition,
            } => self.plan_join(*kind, left, right, condition.as_ref(), ctes),
            BoundTableRef::Subquery { select, alias } => {
                let child = self.plan_select(select)?;
                Ok(rename_with_alias(child, alias))
            }
            BoundTableRef::ExpressionList { rows } => self.plan_expression_list(rows),
        }
    }

    fn plan_base_table(
        &mut self,
        table: &str,
        alias: Option<&str>,
        ctes: &[Cte],
    ) -> Result<PlanRef> {
        if let Some(cte) = ctes.iter().find(|c| c.name == table) {
            let child = self.plan_select(&cte.select)?;
            return Ok(rename_with_alias(child, alias.unwrap_or(&cte.name)));
        }

        let exposed = alias.unwrap_or(table);
        if table.starts_with("__mock") {
            let schema = mock_scan::mock_schema(table)?;
            return Ok(PlanNode::new(
                Arc::new(schema.with_prefix(exposed)),
                vec![],
                PlanKind::MockScan {
                    table_name: table.to_string(),
                },
            ));
        }

        let info = self.catalog.table(table)?;
        Ok(PlanNode::new(
            Arc::new(info.schema().with_prefix(exposed)),
            vec![],
            PlanKind::SeqScan {
                table_oid: info.oid(),
                table_name: table.to_string(),
                predicate: None,
            },
        ))
    }

    fn plan_join(
        &mut self,
        kind: JoinKind,
        left: &BoundTableRef,
        right: &BoundTableRef,
        condition: Option<&crate::binder::BoundExpr>,
        ctes: &[Cte],
    ) -> Result<PlanRef> {
        let join_type = match kind {
            JoinKind::Inner | JoinKind::Cross => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
            JoinKind::Right | JoinKind::Full => {
                engine_bail!(ErrorKind::NotImplemented, "join type {:?} not supported", kind)
            }
        };

        let left_plan = self.plan_table_ref(left, ctes)?;
        let right_plan = self.plan_table_ref(right, ctes)?;

        let predicate = match condition {
            Some(cond) => {
                let (_, expr) =
                    self.plan_expression(cond, &[&left_plan, &right_plan])?;
                expr
            }
            None => Expression::constant(Value::Boolean(true)),
        };

        let mut columns = left_plan.output_schema().columns().to_vec();
        columns.extend(right_plan.output_schema().columns().iter().cloned());

        Ok(PlanNode::new(
            Arc::new(Schema::new(columns)),
            vec![left_plan, right_plan],
            PlanKind::NestedLoopJoin {
                join_type,
                predicate,
            },
        ))
    }

    fn plan_expression_list(
        &mut self,
        rows: &[Vec<crate::binder::BoundExpr>],
    ) -> Result<PlanRef> {
        let mut planned_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let mut exprs = Vec::with_capacity(row.len());
            for bound in row {
                let (_, expr) = self.plan_expression(bound, &[])?;
                exprs.push(expr);
            }
            planned_rows.push(exprs);
        }

        let first = planned_rows.first().map(|r| r.as_slice()).unwrap_or(&[]);
        let columns: Vec<Column> = first
            .iter()
            .enumerate()
            .map(|(i, e)| Column::new(format!("__values#{}", i), e.return_type()))
            .collect();

        for row in &planned_rows {
            if row.len() != first.len() {
                engine_bail!(
                    ErrorKind::SchemaMismatch,
                    "VALUES rows disagree on column count"
                );
            }
        }

        Ok(PlanNode::new(
            Arc::new(Schema::new(columns)),
            vec![],
            PlanKind::Values { rows: planned_rows },
        ))
    }
}

/// Wraps a subquery/CTE plan in a projection that re-qualifies every
/// output column under the alias.
fn rename_with_alias(child: PlanRef, alias: &str) -> PlanRef {
    let child_schema = child.output_schema();
    let mut exprs = Vec::with_capacity(child_schema.column_count());
    let mut columns = Vec::with_capacity(child_schema.column_count());
    for (idx, col) in child_schema.columns().iter().enumerate() {
        exprs.push(Expression::column(0, idx, col.data_type()));
        let base = col.name().rsplit('.').next().unwrap_or(col.name());
        columns.push(col.renamed(format!("{}.{}", alias, base)));
    }
    PlanNode::new(
        Arc::new(Schema::new(columns)),
        vec![child],
        PlanKind::Projection { exprs },
    )
}
