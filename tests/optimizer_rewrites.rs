//! Optimizer rewrite coverage: every rule fires on its shape, rewrites
//! stay semantically equivalent, and optimization is idempotent.

mod common;

use common::{ints, select_all, TestDb};
use vexdb::binder::{
    BoundExpr, BoundStatement, BoundTableRef, JoinKind, OrderByItem, OrderDirection,
    SelectStatement,
};
use vexdb::index::IndexKind;
use vexdb::types::{Column, DataType, Value};

fn int_table(db: &TestDb, name: &str, col: &str, values: &[i32]) {
    db.create_table(name, vec![Column::new(col, DataType::Integer)]);
    db.insert_values(name, values.iter().map(|&v| ints(&[v])).collect());
}

#[test]
fn optimization_is_idempotent() {
    let db = TestDb::new();
    db.create_table(
        "t",
        vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Integer),
        ],
    );

    let mut stmt = select_all("t");
    stmt.predicate = Some(BoundExpr::binary(
        ">",
        BoundExpr::col("a"),
        BoundExpr::lit(Value::Integer(1)),
    ));
    stmt.select_list = vec![BoundExpr::col("b")];
    stmt.order_by = vec![OrderByItem {
        direction: OrderDirection::Asc,
        expr: BoundExpr::col("b"),
    }];
    stmt.limit = Some(BoundExpr::lit(Value::Integer(5)));

    let plan = db.plan(&BoundStatement::Select(stmt));
    let once = db.optimize(&plan);
    let twice = db.optimize(&once);
    assert_eq!(*once, *twice);
    assert_eq!(once.explain(), twice.explain());
}

#[test]
fn true_filter_is_eliminated() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[1, 2]);

    let mut stmt = select_all("t");
    stmt.predicate = Some(BoundExpr::lit(Value::Boolean(true)));
    stmt.select_list = vec![BoundExpr::col("a")];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    assert!(!optimized.explain().contains("Filter"));
    assert_eq!(db.execute(&optimized).len(), 2);
}

#[test]
fn filter_merges_into_seq_scan() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[1, 2, 3]);

    let mut stmt = select_all("t");
    stmt.predicate = Some(BoundExpr::binary(
        ">",
        BoundExpr::col("a"),
        BoundExpr::lit(Value::Integer(1)),
    ));
    stmt.select_list = vec![BoundExpr::col("a")];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    let explain = optimized.explain();
    assert!(explain.contains("SeqScan on t (filter="), "{}", explain);
    assert!(!explain.contains("-> Filter"), "{}", explain);
    assert_eq!(db.execute(&optimized), vec![ints(&[2]), ints(&[3])]);
}

#[test]
fn identity_projection_is_merged() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[7]);

    let mut stmt = select_all("t");
    stmt.select_list = vec![BoundExpr::col("a")];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    let explain = optimized.explain();
    assert!(!explain.contains("Projection"), "{}", explain);
    // The merged node keeps the projection's output schema.
    assert_eq!(optimized.output_schema().column(0).name(), "t.a");
}

#[test]
fn sort_limit_fuses_into_topn() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[5, 1, 4, 2, 3]);

    let mut stmt = select_all("t");
    stmt.select_list = vec![BoundExpr::col("a")];
    stmt.order_by = vec![OrderByItem {
        direction: OrderDirection::Asc,
        expr: BoundExpr::col("a"),
    }];
    stmt.limit = Some(BoundExpr::lit(Value::Integer(3)));

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    let explain = optimized.explain();
    assert!(explain.contains("TopN"), "{}", explain);
    assert!(!explain.contains("-> Sort"), "{}", explain);
    assert!(!explain.contains("-> Limit"), "{}", explain);
    assert_eq!(
        db.execute(&optimized),
        vec![ints(&[1]), ints(&[2]), ints(&[3])]
    );
}

fn equi_join_statement() -> BoundStatement {
    let mut stmt = SelectStatement::from_table(BoundTableRef::Join {
        kind: JoinKind::Inner,
        left: Box::new(BoundTableRef::base("r")),
        right: Box::new(BoundTableRef::base("s")),
        condition: Some(BoundExpr::binary(
            "=",
            BoundExpr::qualified_col("r", "a"),
            BoundExpr::qualified_col("s", "b"),
        )),
    });
    stmt.select_list = vec![BoundExpr::qualified_col("r", "a")];
    BoundStatement::Select(stmt)
}

#[test]
fn equi_join_becomes_hash_join() {
    let db = TestDb::new();
    int_table(&db, "r", "a", &[1, 2, 3]);
    int_table(&db, "s", "b", &[2, 3, 4]);

    let optimized = db.optimize(&db.plan(&equi_join_statement()));
    let explain = optimized.explain();
    assert!(explain.contains("HashJoin"), "{}", explain);
    assert!(!explain.contains("NestedLoopJoin"), "{}", explain);
    assert_eq!(db.execute(&optimized), vec![ints(&[2]), ints(&[3])]);
}

#[test]
fn indexed_inner_side_becomes_index_join() {
    let db = TestDb::new();
    int_table(&db, "r", "a", &[1, 2, 3]);
    int_table(&db, "s", "b", &[2, 3, 4]);
    db.catalog
        .create_index("s_b", "s", vec![0], IndexKind::BPlusTree, false)
        .unwrap();

    let optimized = db.optimize(&db.plan(&equi_join_statement()));
    let explain = optimized.explain();
    assert!(explain.contains("NestedIndexJoin"), "{}", explain);
    assert!(!explain.contains("HashJoin"), "{}", explain);
    assert_eq!(db.execute(&optimized), vec![ints(&[2]), ints(&[3])]);
}

#[test]
fn equality_predicate_becomes_index_scan() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[1, 2, 3, 4]);
    db.catalog
        .create_index("t_a", "t", vec![0], IndexKind::Hash, false)
        .unwrap();

    let mut stmt = select_all("t");
    stmt.predicate = Some(BoundExpr::binary(
        "=",
        BoundExpr::col("a"),
        BoundExpr::lit(Value::Integer(3)),
    ));
    stmt.select_list = vec![BoundExpr::col("a")];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    let explain = optimized.explain();
    assert!(explain.contains("IndexScan using t_a"), "{}", explain);
    assert!(!explain.contains("SeqScan"), "{}", explain);
    assert_eq!(db.execute(&optimized), vec![ints(&[3])]);
}

#[test]
fn ascending_sort_uses_ordered_index() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[3, 1, 2]);
    db.catalog
        .create_index("t_a", "t", vec![0], IndexKind::Ordered, false)
        .unwrap();

    let mut stmt = select_all("t");
    stmt.select_list = vec![BoundExpr::col("a")];
    stmt.order_by = vec![OrderByItem {
        direction: OrderDirection::Asc,
        expr: BoundExpr::col("a"),
    }];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    let explain = optimized.explain();
    assert!(explain.contains("IndexScan using t_a (ordered)"), "{}", explain);
    assert!(!explain.contains("-> Sort"), "{}", explain);
    assert_eq!(
        db.execute(&optimized),
        vec![ints(&[1]), ints(&[2]), ints(&[3])]
    );
}

#[test]
fn descending_sort_keeps_the_sort_node() {
    let db = TestDb::new();
    int_table(&db, "t", "a", &[3, 1, 2]);
    db.catalog
        .create_index("t_a", "t", vec![0], IndexKind::Ordered, false)
        .unwrap();

    let mut stmt = select_all("t");
    stmt.select_list = vec![BoundExpr::col("a")];
    stmt.order_by = vec![OrderByItem {
        direction: OrderDirection::Desc,
        expr: BoundExpr::col("a"),
    }];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    assert!(optimized.explain().contains("-> Sort"));
}

#[test]
fn filter_above_inner_join_merges_into_condition() {
    let db = TestDb::new();
    int_table(&db, "r", "a", &[1, 2, 3]);
    int_table(&db, "s", "b", &[1, 2, 3]);

    // Cross join plus WHERE r.a = s.b: the filter folds into the join,
    // which then qualifies for the hash-join rewrite.
    let mut stmt = SelectStatement::from_table(BoundTableRef::Join {
        kind: JoinKind::Cross,
        left: Box::new(BoundTableRef::base("r")),
        right: Box::new(BoundTableRef::base("s")),
        condition: None,
    });
    stmt.predicate = Some(BoundExpr::binary(
        "=",
        BoundExpr::qualified_col("r", "a"),
        BoundExpr::qualified_col("s", "b"),
    ));
    stmt.select_list = vec![BoundExpr::qualified_col("r", "a")];

    let optimized = db.optimize(&db.plan(&BoundStatement::Select(stmt)));
    let explain = optimized.explain();
    assert!(!explain.contains("-> Filter"), "{}", explain);
    assert_eq!(
        db.execute(&optimized),
        vec![ints(&[1]), ints(&[2]), ints(&[3])]
    );
}
