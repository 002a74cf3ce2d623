use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures while bringing audit records into memory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open audit file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed audit CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("audit data is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {row}: unparseable timestamp '{value}'")]
    UnparseableTimestamp { row: usize, value: String },
    #[error("no usable audit rows ({dropped} dropped for unparseable timestamps or blank evaluatees)")]
    NoUsableRows { dropped: usize },
    #[error("audit store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Recoverable outcomes of the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("quartile analysis needs at least {required} evaluatees, found {found}")]
    InsufficientData { found: usize, required: usize },
}
