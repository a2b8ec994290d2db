use epimetrics_core::MetricsError;
use thiserror::Error;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error, including failed casts inside SQL artifacts.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (creating the warehouse directory).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Source rows the engine cannot compute over.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Query was rejected due to policy violation.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// Query execution timed out.
    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// The eager artifact was read before its first refresh.
    #[error("'{artifact}' has not been materialized yet; refresh it first")]
    SnapshotMissing { artifact: &'static str },
}
