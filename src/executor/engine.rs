//! # Execution Engine
//!
//! Drives the root executor: `init`, then `next` until exhaustion,
//! appending each row to the result set. On any failure the partially
//! accumulated results are discarded and the failure surfaces to the
//! caller; `ExecutionAborted` is the one kind the engine treats as an
//! executor-initiated stop rather than an unexpected error, but the
//! partial result is discarded either way.

use super::{create_executor, ExecutorContext};
use crate::error::{kind_of, EngineError, ErrorKind};
use crate::plan::PlanRef;
use crate::storage::Tuple;
use eyre::Result;
use std::sync::Arc;

pub struct ExecutionEngine {
    ctx: Arc<ExecutorContext>,
}

impl ExecutionEngine {
    pub fn new(ctx: Arc<ExecutorContext>) -> ExecutionEngine {
        ExecutionEngine { ctx }
    }

    pub fn context(&self) -> &Arc<ExecutorContext> {
        &self.ctx
    }

    /// Runs a plan to completion and materializes the result rows.
    ///
    /// Any failure discards the rows accumulated so far. An
    /// `ExecutionAborted` raised by an executor is intercepted here and
    /// re-reported as the engine's own abort diagnostic; every other
    /// failure bubbles unchanged.
    pub fn execute(&self, plan: &PlanRef) -> Result<Vec<Tuple>> {
        let mut root = create_executor(&self.ctx, plan)?;
        root.init()?;

        let mut results = Vec::new();
        loop {
            match root.next() {
                Ok(Some((tuple, _))) => results.push(tuple),
                Ok(None) => return Ok(results),
                Err(err) => {
                    results.clear();
                    if kind_of(&err) == Some(ErrorKind::ExecutionAborted) {
                        return Err(eyre::Report::new(EngineError::new(
                            ErrorKind::ExecutionAborted,
                            format!("statement aborted by executor: {}", err),
                        )));
                    }
                    return Err(err);
                }
            }
        }
    }
}
