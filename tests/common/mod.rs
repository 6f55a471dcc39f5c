//! Shared fixture: an in-memory database driven through the full
//! pipeline (bound statement -> plan -> optimize -> execute).

use std::sync::Arc;

use vexdb::binder::{
    BoundExpr, BoundStatement, BoundTableRef, InsertStatement, SelectStatement,
};
use vexdb::executor::{ExecutionEngine, ExecutorContext};
use vexdb::plan::PlanRef;
use vexdb::storage::{BufferPool, Tuple};
use vexdb::types::{Column, Schema, Value};
use vexdb::{Catalog, Optimizer, Planner, SessionConfig};

pub struct TestDb {
    pub catalog: Arc<Catalog>,
}

#[allow(dead_code)]
impl TestDb {
    pub fn new() -> TestDb {
        TestDb {
            catalog: Arc::new(Catalog::new(Arc::new(BufferPool::new()))),
        }
    }

    pub fn create_table(&self, name: &str, columns: Vec<Column>) {
        self.catalog
            .create_table(name, Schema::new(columns))
            .expect("create table");
    }

    /// Runs an INSERT ... VALUES through the whole pipeline; returns the
    /// reported row count.
    pub fn insert_values(&self, table: &str, rows: Vec<Vec<Value>>) -> i32 {
        let source = SelectStatement::from_table(BoundTableRef::ExpressionList {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(BoundExpr::Constant).collect())
                .collect(),
        });
        let stmt = BoundStatement::Insert(InsertStatement {
            table: table.to_string(),
            source: Box::new(source),
        });
        let result = self.run(&stmt);
        match result[0][0] {
            Value::Integer(n) => n,
            ref other => panic!("unexpected insert count {:?}", other),
        }
    }

    pub fn plan(&self, stmt: &BoundStatement) -> PlanRef {
        Planner::new(&self.catalog).plan(stmt).expect("plan")
    }

    pub fn optimize(&self, plan: &PlanRef) -> PlanRef {
        self.optimize_with(plan, SessionConfig::default())
    }

    pub fn optimize_with(&self, plan: &PlanRef, config: SessionConfig) -> PlanRef {
        Optimizer::new(&self.catalog, config).optimize(plan)
    }

    pub fn execute(&self, plan: &PlanRef) -> Vec<Vec<Value>> {
        self.execute_with(plan, SessionConfig::default())
    }

    pub fn execute_with(&self, plan: &PlanRef, config: SessionConfig) -> Vec<Vec<Value>> {
        let ctx = Arc::new(ExecutorContext::new(Arc::clone(&self.catalog)).with_config(config));
        let engine = ExecutionEngine::new(ctx);
        let tuples: Vec<Tuple> = engine.execute(plan).expect("execute");
        tuples
            .iter()
            .map(|t| t.values(plan.output_schema()).expect("decode row"))
            .collect()
    }

    /// Full pipeline with the default session configuration.
    pub fn run(&self, stmt: &BoundStatement) -> Vec<Vec<Value>> {
        let plan = self.plan(stmt);
        let optimized = self.optimize(&plan);
        self.execute(&optimized)
    }

    pub fn run_with_config(
        &self,
        stmt: &BoundStatement,
        config: SessionConfig,
    ) -> Vec<Vec<Value>> {
        let plan = self.plan(stmt);
        let optimized = self.optimize_with(&plan, config);
        self.execute_with(&optimized, config)
    }
}

#[allow(dead_code)]
pub fn select_all(table: &str) -> SelectStatement {
    SelectStatement::from_table(BoundTableRef::base(table))
}

#[allow(dead_code)]
pub fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&v| Value::Integer(v)).collect()
}
