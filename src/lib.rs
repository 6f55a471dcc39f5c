//! # vexdb - Embedded Relational Engine with Vector Search
//!
//! vexdb is an embedded relational database engine extended with
//! first-class vector types and approximate nearest-neighbor indexes.
//! Statements arrive as bound ASTs, compile into immutable plan trees,
//! pass through a rule-based optimizer, and execute through a pull-based
//! (Volcano) operator pipeline over a paged, buffer-managed table heap.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   Bound Statements (binder contract)  │
//! ├──────────────────────────────────────┤
//! │        Planner  →  Plan Tree          │
//! ├──────────────────────────────────────┤
//! │    Optimizer (ordered rewrite rules)  │
//! ├──────────────────────────────────────┤
//! │  Executor Factory → Volcano Pipeline  │
//! ├──────────────────────────────────────┤
//! │  Catalog │ Index Family │ Expressions │
//! ├──────────────────────────────────────┤
//! │   Table Heap │ Slotted Pages │ Pool   │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Vector Queries
//!
//! A `SELECT ... ORDER BY v <-> '[...]' LIMIT k` plans as scan + sort +
//! limit; with a matching IVFFlat or HNSW index (and the
//! `vector_index_method` session variable set) the optimizer rewrites the
//! pipeline into a `VectorIndexScan` that asks the index for the top-k
//! RIDs directly. Distance kernels (L2, negated inner product, cosine)
//! run in four-lane blocks with an optional process-wide memoization
//! cache.
//!
//! ## Module Overview
//!
//! - [`types`]: tagged SQL values, columns, schemas
//! - [`storage`]: buffer pool, slotted pages, tuples, table heap
//! - [`catalog`]: table and index registry
//! - [`expr`]: expression trees with `eval` / `eval_join`
//! - [`vector`]: distance kernels and the memoization cache
//! - [`index`]: B+Tree, extendible hash, ordered/unordered, IVFFlat, HNSW
//! - [`binder`]: bound statement contract (data only)
//! - [`plan`]: reference-counted plan nodes
//! - [`planner`]: bound AST → plan tree
//! - [`optimizer`]: rule-based rewrites, including the vector-scan rule
//! - [`executor`]: Volcano operators and the execution engine
//!
//! The SQL lexer/parser, disk I/O, buffer replacement, write-ahead
//! logging, and MVCC are external collaborators; this crate consumes
//! their contracts (bound statements, page frames, transaction handles)
//! and produces results and mutations.

#[macro_use]
mod macros;

pub mod binder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod index;
pub mod optimizer;
pub mod plan;
pub mod planner;
pub mod storage;
pub mod txn;
pub mod types;
pub mod vector;

pub use catalog::Catalog;
pub use config::{SessionConfig, VectorIndexMethod};
pub use error::{EngineError, ErrorKind};
pub use executor::{ExecutionEngine, ExecutorContext};
pub use optimizer::Optimizer;
pub use planner::Planner;
pub use storage::BufferPool;
pub use types::{Column, DataType, Schema, Value};
