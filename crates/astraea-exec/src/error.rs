//! Execution errors.

use thiserror::Error;

/// Errors that invalidate a whole domain execution.
///
/// Per-variable handler failures are NOT here: the engine converts those to
/// a null column and a logged warning, and validation registers the nulls.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// None of the spec's source datasets were supplied.
    #[error("no source data for domain {domain}: expected one of {expected:?}")]
    MissingSources {
        domain: String,
        expected: Vec<String>,
    },

    #[error(transparent)]
    Reference(#[from] astraea_reference::ReferenceError),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("write failed for {path}: {message}")]
    Write { path: String, message: String },
}

/// Per-variable handler failure. Caught by the engine, never fatal.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("source column {0} not found")]
    ColumnNotFound(String),

    #[error("mapping has no {0}")]
    MissingField(&'static str),

    #[error("derivation rule unparseable: {0}")]
    BadRule(String),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] polars::error::PolarsError),
}
