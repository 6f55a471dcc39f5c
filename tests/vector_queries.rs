//! Vector query scenarios: naive KNN through sort+limit, the
//! vector-index rewrite, session-variable gating, and edge cases.

mod common;

use common::TestDb;
use vexdb::binder::{BoundExpr, BoundStatement, OrderByItem, OrderDirection};
use vexdb::index::IndexKind;
use vexdb::types::{Column, DataType, Value};
use vexdb::{SessionConfig, VectorIndexMethod};

fn vec3(x: f64, y: f64, z: f64) -> Value {
    Value::Vector(vec![x, y, z])
}

/// `SELECT v FROM t ORDER BY v <-> '[1,1,1]' LIMIT k`.
fn knn_statement(k: i32) -> BoundStatement {
    let mut stmt = common::select_all("t");
    stmt.select_list = vec![BoundExpr::col("v")];
    stmt.order_by = vec![OrderByItem {
        direction: OrderDirection::Asc,
        expr: BoundExpr::binary(
            "<->",
            BoundExpr::col("v"),
            BoundExpr::lit(vec3(1.0, 1.0, 1.0)),
        ),
    }];
    stmt.limit = Some(BoundExpr::lit(Value::Integer(k)));
    BoundStatement::Select(stmt)
}

fn vector_table() -> TestDb {
    let db = TestDb::new();
    db.create_table(
        "t",
        vec![Column::with_length("v", DataType::Vector, 3)],
    );
    db.insert_values(
        "t",
        vec![
            vec![vec3(-1.0, 1.0, 1.0)],
            vec![vec3(-2.0, 1.0, 1.0)],
            vec![vec3(1.0, 1.0, 1.0)],
            vec![vec3(2.0, 1.0, 1.0)],
        ],
    );
    db
}

fn ivf_config() -> SessionConfig {
    SessionConfig::default().with_vector_index_method(VectorIndexMethod::IvfFlat)
}

/// S5: no index, the naive sort pipeline ranks by L2.
#[test]
fn naive_knn_without_index() {
    let db = vector_table();
    let rows = db.run(&knn_statement(2));
    assert_eq!(
        rows,
        vec![vec![vec3(1.0, 1.0, 1.0)], vec![vec3(2.0, 1.0, 1.0)]]
    );
}

/// S6: with an IVFFlat index and the session variable set, the same query
/// rewrites to a VectorIndexScan and returns the same rows.
#[test]
fn ivfflat_rewrite_matches_naive_results() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_ivf",
            "t",
            0,
            "vector_l2_ops",
            &[("lists".to_string(), 2), ("probe_lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    let stmt = knn_statement(2);
    let plan = db.plan(&stmt);
    let optimized = db.optimize_with(&plan, ivf_config());

    let explain = optimized.explain();
    assert!(
        explain.contains("VectorIndexScan"),
        "expected a vector index scan:\n{}",
        explain
    );
    assert!(!explain.contains("Sort"), "sort survived:\n{}", explain);

    let rows = db.execute_with(&optimized, ivf_config());
    assert_eq!(
        rows,
        vec![vec![vec3(1.0, 1.0, 1.0)], vec![vec3(2.0, 1.0, 1.0)]]
    );
}

#[test]
fn default_session_suppresses_the_rewrite() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_ivf",
            "t",
            0,
            "vector_l2_ops",
            &[("lists".to_string(), 2), ("probe_lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    let plan = db.plan(&knn_statement(2));
    let optimized = db.optimize(&plan);
    assert!(!optimized.explain().contains("VectorIndexScan"));
}

#[test]
fn method_mismatch_suppresses_the_rewrite() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_ivf",
            "t",
            0,
            "vector_l2_ops",
            &[("lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    // Session asks for HNSW; only an IVFFlat index exists.
    let config =
        SessionConfig::default().with_vector_index_method(VectorIndexMethod::Hnsw);
    let plan = db.plan(&knn_statement(2));
    let optimized = db.optimize_with(&plan, config);
    assert!(!optimized.explain().contains("VectorIndexScan"));
}

#[test]
fn metric_mismatch_suppresses_the_rewrite() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_cos",
            "t",
            0,
            "vector_cosine_ops",
            &[("lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    // The query sorts by L2; the only index is cosine.
    let plan = db.plan(&knn_statement(2));
    let optimized = db.optimize_with(&plan, ivf_config());
    assert!(!optimized.explain().contains("VectorIndexScan"));
}

#[test]
fn hnsw_rewrite_matches_naive_results() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_hnsw",
            "t",
            0,
            "vector_l2_ops",
            &[
                ("m".to_string(), 4),
                ("ef_construction".to_string(), 32),
                ("ef_search".to_string(), 16),
            ],
            IndexKind::Hnsw,
        )
        .unwrap();

    let config =
        SessionConfig::default().with_vector_index_method(VectorIndexMethod::Hnsw);
    let stmt = knn_statement(2);
    let plan = db.plan(&stmt);
    let optimized = db.optimize_with(&plan, config);
    assert!(optimized.explain().contains("VectorIndexScan"));

    let rows = db.execute_with(&optimized, config);
    assert_eq!(
        rows,
        vec![vec![vec3(1.0, 1.0, 1.0)], vec![vec3(2.0, 1.0, 1.0)]]
    );
}

#[test]
fn limit_zero_emits_no_rows() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_ivf",
            "t",
            0,
            "vector_l2_ops",
            &[("lists".to_string(), 2), ("probe_lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    let rows = db.run_with_config(&knn_statement(0), ivf_config());
    assert!(rows.is_empty());
}

#[test]
fn index_lags_behind_deletes() {
    let db = vector_table();
    db.catalog
        .create_vector_index(
            "t_v_ivf",
            "t",
            0,
            "vector_l2_ops",
            &[("lists".to_string(), 2), ("probe_lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    // Tombstone the nearest row directly in the heap, leaving the index
    // stale; the executor must skip it and keep going.
    let table = db.catalog.table("t").unwrap();
    let nearest = table
        .heap()
        .iter()
        .unwrap()
        .map(|item| item.unwrap())
        .find(|(_, tuple)| {
            tuple.value_at(table.schema(), 0).unwrap() == vec3(1.0, 1.0, 1.0)
        })
        .expect("row exists");
    table
        .heap()
        .update_meta(
            &vexdb::storage::TupleMeta {
                ts: 1,
                is_deleted: true,
            },
            nearest.1.rid().unwrap(),
        )
        .unwrap();

    let rows = db.run_with_config(&knn_statement(2), ivf_config());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], vec![vec3(2.0, 1.0, 1.0)]);
}

#[test]
fn dimension_mismatch_fails_the_statement() {
    let db = vector_table();

    let mut stmt = common::select_all("t");
    stmt.select_list = vec![BoundExpr::col("v")];
    stmt.order_by = vec![OrderByItem {
        direction: OrderDirection::Asc,
        expr: BoundExpr::binary(
            "<->",
            BoundExpr::col("v"),
            BoundExpr::lit(Value::Vector(vec![1.0, 2.0])),
        ),
    }];

    let plan = db.plan(&BoundStatement::Select(stmt));
    let optimized = db.optimize(&plan);
    let ctx = std::sync::Arc::new(vexdb::ExecutorContext::new(std::sync::Arc::clone(
        &db.catalog,
    )));
    let err = vexdb::ExecutionEngine::new(ctx).execute(&optimized).unwrap_err();
    assert_eq!(
        vexdb::error::kind_of(&err),
        Some(vexdb::ErrorKind::TypeMismatch)
    );
}

#[test]
fn scan_vector_over_all_points_is_a_permutation() {
    let db = vector_table();
    let info = db
        .catalog
        .create_vector_index(
            "t_v_ivf",
            "t",
            0,
            "vector_l2_ops",
            &[("lists".to_string(), 2), ("probe_lists".to_string(), 2)],
            IndexKind::IvfFlat,
        )
        .unwrap();

    let mut rids = info.index().scan_vector(&[0.0, 0.0, 0.0], 4).unwrap();
    rids.sort_by_key(|r| (r.page_id, r.slot));
    assert_eq!(rids.len(), 4);
    rids.dedup();
    assert_eq!(rids.len(), 4, "duplicate rids in scan result");
}
