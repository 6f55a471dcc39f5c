//! # Engine Error Taxonomy
//!
//! All fallible paths in vexdb return `eyre::Result`. Errors that the engine
//! needs to classify (or that callers may want to match on) are raised as an
//! [`EngineError`] attached to the `eyre::Report`, so the execution engine can
//! `downcast_ref::<EngineError>()` and inspect the kind without losing the
//! context chain.
//!
//! ## Kinds
//!
//! | Kind | Meaning |
//! |------|---------|
//! | NotImplemented | Operator or feature intentionally stubbed out |
//! | TypeMismatch | Incompatible value types or vector dimension mismatch |
//! | SchemaMismatch | Source row shape does not match the target table |
//! | NotFound | Table, index or CTE name did not resolve |
//! | AlreadyExists | Duplicate table or index name |
//! | Conflict | Concurrent mutation detected by the MVCC collaborator |
//! | ExecutionAborted | Executor-initiated pipeline termination |
//! | Invariant | Broken internal invariant (programmer bug) |
//!
//! Executors never catch failures. The execution engine intercepts only
//! `ExecutionAborted` (discarding the partial result set); everything else
//! bubbles to the caller unchanged. DDL errors abort the statement without
//! mutating the catalog.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotImplemented,
    TypeMismatch,
    SchemaMismatch,
    NotFound,
    AlreadyExists,
    Conflict,
    ExecutionAborted,
    Invariant,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::SchemaMismatch => "schema mismatch",
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ExecutionAborted => "execution aborted",
            ErrorKind::Invariant => "invariant broken",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineError {
    kind: ErrorKind,
    message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for EngineError {}

/// Raises an [`EngineError`] of the given kind with a formatted message.
#[macro_export]
macro_rules! engine_bail {
    ($kind:expr, $($arg:tt)*) => {
        return Err(::eyre::Report::new($crate::error::EngineError::new(
            $kind,
            format!($($arg)*),
        )))
    };
}

/// `ensure!`-style invariant check that raises `ErrorKind::Invariant`.
#[macro_export]
macro_rules! engine_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::engine_bail!($crate::error::ErrorKind::Invariant, $($arg)*);
        }
    };
}

/// Returns the [`ErrorKind`] carried by an `eyre::Report`, if any.
pub fn kind_of(report: &eyre::Report) -> Option<ErrorKind> {
    report.downcast_ref::<EngineError>().map(|e| e.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails() -> eyre::Result<()> {
        engine_bail!(ErrorKind::NotFound, "table '{}' does not exist", "users");
    }

    #[test]
    fn engine_error_round_trips_through_report() {
        let err = fails().unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn plain_eyre_reports_have_no_kind() {
        let err = eyre::eyre!("something else");
        assert_eq!(kind_of(&err), None);
    }

    #[test]
    fn display_includes_kind_prefix() {
        let err = EngineError::new(ErrorKind::TypeMismatch, "int vs varchar");
        assert_eq!(err.to_string(), "type mismatch: int vs varchar");
    }
}
