//! # Init/Next Instrumentation
//!
//! A transparent wrapper that counts `init` and `next` calls on the
//! executor it wraps. Pipeline-contract tests use it to assert, for
//! example, that a nested-loop join initializes its right child once
//! rather than once per left row.

use super::Executor;
use crate::storage::{Rid, Tuple};
use crate::types::Schema;
use eyre::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct InitCheckCounters {
    init_count: AtomicUsize,
    next_count: AtomicUsize,
}

impl InitCheckCounters {
    pub fn new() -> Arc<InitCheckCounters> {
        Arc::new(InitCheckCounters::default())
    }

    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    pub fn next_count(&self) -> usize {
        self.next_count.load(Ordering::SeqCst)
    }
}

pub struct InitCheckExecutor {
    counters: Arc<InitCheckCounters>,
    inner: Box<dyn Executor>,
}

impl InitCheckExecutor {
    pub fn new(inner: Box<dyn Executor>, counters: Arc<InitCheckCounters>) -> InitCheckExecutor {
        InitCheckExecutor { counters, inner }
    }
}

impl Executor for InitCheckExecutor {
    fn init(&mut self) -> Result<()> {
        self.counters.init_count.fetch_add(1, Ordering::SeqCst);
        self.inner.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        self.counters.next_count.fetch_add(1, Ordering::SeqCst);
        self.inner.next()
    }

    fn output_schema(&self) -> &Arc<Schema> {
        self.inner.output_schema()
    }
}
