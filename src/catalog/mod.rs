//! # Catalog
//!
//! Non-persistent registry of tables and indexes, used by the planner, the
//! optimizer and the executors. The catalog exclusively owns table heaps
//! and index structures; everything else borrows through `Arc` handles
//! that stay valid for the catalog's lifetime.
//!
//! ## Concurrency
//!
//! Read-mostly: lookups take the map read locks, DDL takes the write
//! locks. Heaps and indexes serialize their own internals, so a shared
//! `Arc<TableInfo>` is enough for executors to mutate table data.
//!
//! ## Naming
//!
//! Table names are unique; index names are unique per table. Names
//! starting with `__` are reserved for the engine (`__mock_*` tables are
//! served by the mock scan executor without touching the catalog). OIDs
//! are monotonic and never reused.

use crate::engine_bail;
use crate::error::ErrorKind;
use crate::index::{
    AnyIndex, BPlusTreeIndex, HashTableIndex, HnswIndex, IndexKey, IndexKind, IndexOptions,
    IvfFlatIndex, OrderedIndex, UnorderedIndex,
};
use crate::storage::{BufferPool, Rid, TableHeap, Tuple};
use crate::types::{DataType, Schema, Value};
use crate::vector::VectorMetric;
use eyre::Result;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub type TableOid = u32;
pub type IndexOid = u32;

/// Metadata and storage for one table.
#[derive(Debug)]
pub struct TableInfo {
    name: String,
    oid: TableOid,
    schema: Arc<Schema>,
    heap: Arc<TableHeap>,
}

impl TableInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn oid(&self) -> TableOid {
        self.oid
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn heap(&self) -> &Arc<TableHeap> {
        &self.heap
    }
}

/// Metadata and structure for one index.
#[derive(Debug)]
pub struct IndexInfo {
    name: String,
    oid: IndexOid,
    table_name: String,
    key_schema: Arc<Schema>,
    key_attrs: SmallVec<[usize; 4]>,
    kind: IndexKind,
    is_primary: bool,
    options: IndexOptions,
    index: AnyIndex,
}

impl IndexInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn oid(&self) -> IndexOid {
        self.oid
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn key_schema(&self) -> &Arc<Schema> {
        &self.key_schema
    }

    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    pub fn index(&self) -> &AnyIndex {
        &self.index
    }

    pub fn metric(&self) -> Option<VectorMetric> {
        self.index.metric()
    }

    /// Extracts this index's key from a full table row.
    pub fn key_of(&self, tuple: &Tuple, table_schema: &Schema) -> Result<IndexKey> {
        let values = tuple.values(table_schema)?;
        Ok(IndexKey::new(
            self.key_attrs.iter().map(|&i| values[i].clone()).collect(),
        ))
    }
}

pub struct Catalog {
    pool: Arc<BufferPool>,
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
    tables_by_oid: RwLock<HashMap<TableOid, Arc<TableInfo>>>,
    /// table name -> index name -> info
    indexes: RwLock<HashMap<String, HashMap<String, Arc<IndexInfo>>>>,
    next_table_oid: AtomicU32,
    next_index_oid: AtomicU32,
}

impl Catalog {
    pub fn new(pool: Arc<BufferPool>) -> Catalog {
        Catalog {
            pool,
            tables: RwLock::new(HashMap::new()),
            tables_by_oid: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            next_table_oid: AtomicU32::new(0),
            next_index_oid: AtomicU32::new(0),
        }
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<TableInfo>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            engine_bail!(ErrorKind::AlreadyExists, "table '{}' already exists", name);
        }

        let oid = self.next_table_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(TableInfo {
            name: name.to_string(),
            oid,
            schema: Arc::new(schema),
            heap: Arc::new(TableHeap::new(Arc::clone(&self.pool))),
        });

        tables.insert(name.to_string(), Arc::clone(&info));
        self.tables_by_oid.write().insert(oid, Arc::clone(&info));
        self.indexes
            .write()
            .entry(name.to_string())
            .or_default();
        Ok(info)
    }

    pub fn table(&self, name: &str) -> Result<Arc<TableInfo>> {
        match self.tables.read().get(name) {
            Some(info) => Ok(Arc::clone(info)),
            None => engine_bail!(ErrorKind::NotFound, "table '{}' does not exist", name),
        }
    }

    pub fn table_by_oid(&self, oid: TableOid) -> Result<Arc<TableInfo>> {
        match self.tables_by_oid.read().get(&oid) {
            Some(info) => Ok(Arc::clone(info)),
            None => engine_bail!(ErrorKind::NotFound, "no table with oid {}", oid),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates a key-based index and backfills it from the table's current
    /// rows. Index insert failures during the backfill are swallowed, the
    /// way duplicate entries are swallowed during DML.
    pub fn create_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_attrs: Vec<usize>,
        kind: IndexKind,
        is_primary: bool,
    ) -> Result<Arc<IndexInfo>> {
        if kind.is_vector() {
            engine_bail!(
                ErrorKind::Invariant,
                "vector indexes go through create_vector_index"
            );
        }
        let table = self.table(table_name)?;
        self.validate_key_attrs(&table, &key_attrs)?;

        let index = match kind {
            IndexKind::BPlusTree => AnyIndex::BPlusTree(BPlusTreeIndex::new()),
            IndexKind::Hash => AnyIndex::Hash(HashTableIndex::new()),
            IndexKind::Ordered => AnyIndex::Ordered(OrderedIndex::new()),
            IndexKind::Unordered => AnyIndex::Unordered(UnorderedIndex::new()),
            IndexKind::IvfFlat | IndexKind::Hnsw => unreachable!(),
        };

        let info = self.register_index(
            index_name,
            &table,
            key_attrs,
            kind,
            is_primary,
            IndexOptions::default(),
            index,
        )?;

        for item in table.heap().iter()? {
            let (meta, tuple) = item?;
            if meta.is_deleted {
                continue;
            }
            let key = info.key_of(&tuple, table.schema())?;
            let rid = tuple.rid().expect("heap tuples carry a rid");
            info.index.insert(&key, rid);
        }
        Ok(info)
    }

    /// Creates an IVFFlat or HNSW index over a single vector column and
    /// bulk-builds it from the table's current rows. `ops` is the operator
    /// class suffix (`vector_l2_ops`, `vector_ip_ops`, `vector_cosine_ops`)
    /// and `with_options` the `WITH (...)` pairs.
    pub fn create_vector_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_attr: usize,
        ops: &str,
        with_options: &[(String, i64)],
        kind: IndexKind,
    ) -> Result<Arc<IndexInfo>> {
        let table = self.table(table_name)?;
        self.validate_key_attrs(&table, &[key_attr])?;
        if table.schema().column(key_attr).data_type() != DataType::Vector {
            engine_bail!(
                ErrorKind::TypeMismatch,
                "column '{}' is not a vector column",
                table.schema().column(key_attr).name()
            );
        }

        let Some(metric) = VectorMetric::from_ops_suffix(ops) else {
            engine_bail!(ErrorKind::NotImplemented, "unsupported distance op '{}'", ops);
        };
        let options = IndexOptions::from_pairs(with_options)?;

        let index = match kind {
            IndexKind::IvfFlat => AnyIndex::IvfFlat(IvfFlatIndex::new(
                metric,
                options.lists,
                options.probe_lists,
            )),
            IndexKind::Hnsw => AnyIndex::Hnsw(HnswIndex::new(
                metric,
                options.m,
                options.ef_construction,
                options.ef_search,
            )),
            other => engine_bail!(
                ErrorKind::Invariant,
                "{:?} is not a vector index kind",
                other
            ),
        };

        let info = self.register_index(
            index_name,
            &table,
            vec![key_attr],
            kind,
            false,
            options,
            index,
        )?;

        let mut points: Vec<(Vec<f64>, Rid)> = Vec::new();
        for item in table.heap().iter()? {
            let (meta, tuple) = item?;
            if meta.is_deleted {
                continue;
            }
            let value = tuple.value_at(table.schema(), key_attr)?;
            if let Value::Vector(v) = value {
                points.push((v, tuple.rid().expect("heap tuples carry a rid")));
            }
        }
        info.index.build(&points)?;
        Ok(info)
    }

    pub fn index(&self, table_name: &str, index_name: &str) -> Result<Arc<IndexInfo>> {
        let indexes = self.indexes.read();
        let table_indexes = match indexes.get(table_name) {
            Some(map) => map,
            None => engine_bail!(ErrorKind::NotFound, "table '{}' does not exist", table_name),
        };
        match table_indexes.get(index_name) {
            Some(info) => Ok(Arc::clone(info)),
            None => engine_bail!(
                ErrorKind::NotFound,
                "index '{}' does not exist on table '{}'",
                index_name,
                table_name
            ),
        }
    }

    /// Every index on a table; empty when the table has none.
    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let indexes = self.indexes.read();
        let mut found: Vec<Arc<IndexInfo>> = indexes
            .get(table_name)
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        found.sort_by_key(|info| info.oid());
        found
    }

    fn validate_key_attrs(&self, table: &TableInfo, key_attrs: &[usize]) -> Result<()> {
        if key_attrs.is_empty() {
            engine_bail!(ErrorKind::Invariant, "index needs at least one key column");
        }
        for &attr in key_attrs {
            if attr >= table.schema().column_count() {
                engine_bail!(
                    ErrorKind::NotFound,
                    "column index {} out of range for table '{}'",
                    attr,
                    table.name()
                );
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn register_index(
        &self,
        index_name: &str,
        table: &Arc<TableInfo>,
        key_attrs: Vec<usize>,
        kind: IndexKind,
        is_primary: bool,
        options: IndexOptions,
        index: AnyIndex,
    ) -> Result<Arc<IndexInfo>> {
        let mut indexes = self.indexes.write();
        let table_indexes = indexes
            .entry(table.name().to_string())
            .or_default();
        if table_indexes.contains_key(index_name) {
            engine_bail!(
                ErrorKind::AlreadyExists,
                "index '{}' already exists on table '{}'",
                index_name,
                table.name()
            );
        }

        let key_schema = Arc::new(table.schema().project(&key_attrs));
        let info = Arc::new(IndexInfo {
            name: index_name.to_string(),
            oid: self.next_index_oid.fetch_add(1, Ordering::SeqCst),
            table_name: table.name().to_string(),
            key_schema,
            key_attrs: SmallVec::from_vec(key_attrs),
            kind,
            is_primary,
            options,
            index,
        });
        table_indexes.insert(index_name.to_string(), Arc::clone(&info));
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TupleMeta;
    use crate::types::Column;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(BufferPool::new()))
    }

    fn people_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::with_length("name", DataType::Varchar, 32),
        ])
    }

    #[test]
    fn create_and_look_up_table() {
        let catalog = catalog();
        let info = catalog.create_table("people", people_schema()).unwrap();
        assert_eq!(info.name(), "people");

        let by_name = catalog.table("people").unwrap();
        let by_oid = catalog.table_by_oid(info.oid()).unwrap();
        assert_eq!(by_name.oid(), by_oid.oid());
    }

    #[test]
    fn duplicate_table_name_is_rejected() {
        let catalog = catalog();
        catalog.create_table("t", people_schema()).unwrap();
        let err = catalog.create_table("t", people_schema()).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(ErrorKind::AlreadyExists)
        );
    }

    #[test]
    fn missing_table_is_not_found() {
        let catalog = catalog();
        let err = catalog.table("ghost").unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[test]
    fn oids_are_monotonic() {
        let catalog = catalog();
        let a = catalog.create_table("a", people_schema()).unwrap();
        let b = catalog.create_table("b", people_schema()).unwrap();
        assert!(b.oid() > a.oid());
    }

    #[test]
    fn index_backfills_existing_rows() {
        let catalog = catalog();
        let table = catalog.create_table("people", people_schema()).unwrap();

        for (id, name) in [(1, "ada"), (2, "grace")] {
            let tuple = Tuple::from_values(
                &[Value::Integer(id), Value::Varchar(name.into())],
                table.schema(),
            )
            .unwrap();
            table.heap().insert(&TupleMeta::default(), &tuple).unwrap();
        }

        let index = catalog
            .create_index("people_id", "people", vec![0], IndexKind::BPlusTree, true)
            .unwrap();

        let hits = index
            .index()
            .scan_key(&IndexKey::new(vec![Value::Integer(2)]));
        assert_eq!(hits.len(), 1);
        assert!(index.is_primary());
    }

    #[test]
    fn duplicate_index_name_is_rejected() {
        let catalog = catalog();
        catalog.create_table("t", people_schema()).unwrap();
        catalog
            .create_index("idx", "t", vec![0], IndexKind::Ordered, false)
            .unwrap();
        let err = catalog
            .create_index("idx", "t", vec![1], IndexKind::Ordered, false)
            .unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(ErrorKind::AlreadyExists)
        );
    }

    #[test]
    fn vector_index_requires_vector_column() {
        let catalog = catalog();
        catalog.create_table("t", people_schema()).unwrap();
        let err = catalog
            .create_vector_index("v", "t", 0, "vector_l2_ops", &[], IndexKind::IvfFlat)
            .unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn vector_index_builds_from_existing_rows() {
        let catalog = catalog();
        let schema = Schema::new(vec![Column::with_length("v", DataType::Vector, 2)]);
        let table = catalog.create_table("points", schema).unwrap();

        for v in [[0.0, 0.0], [1.0, 0.0], [5.0, 5.0]] {
            let tuple =
                Tuple::from_values(&[Value::Vector(v.to_vec())], table.schema()).unwrap();
            table.heap().insert(&TupleMeta::default(), &tuple).unwrap();
        }

        let index = catalog
            .create_vector_index(
                "points_v",
                "points",
                0,
                "vector_l2_ops",
                &[("lists".to_string(), 2), ("probe_lists".to_string(), 2)],
                IndexKind::IvfFlat,
            )
            .unwrap();

        assert_eq!(index.metric(), Some(VectorMetric::L2));
        let hits = index.index().scan_vector(&[0.1, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn unknown_distance_ops_is_not_implemented() {
        let catalog = catalog();
        let schema = Schema::new(vec![Column::with_length("v", DataType::Vector, 2)]);
        catalog.create_table("t", schema).unwrap();
        let err = catalog
            .create_vector_index("v", "t", 0, "vector_hamming_ops", &[], IndexKind::Hnsw)
            .unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(ErrorKind::NotImplemented)
        );
    }

    #[test]
    fn table_indexes_lists_in_creation_order() {
        let catalog = catalog();
        catalog.create_table("t", people_schema()).unwrap();
        catalog
            .create_index("first", "t", vec![0], IndexKind::Ordered, false)
            .unwrap();
        catalog
            .create_index("second", "t", vec![1], IndexKind::Hash, false)
            .unwrap();

        let names: Vec<String> = catalog
            .table_indexes("t")
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
