pub mod codec;
pub mod db_pool;
pub mod executor;
pub mod schema_manager;
pub mod statement_guard;

#[cfg(test)]
pub mod mock;

use codec::StoreValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("{0}")]
    Query(#[from] duckdb::Error),
}

/// What a statement produced: column names in result-set order, the leading
/// rows, and how many rows there were in total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<StoreValue>>,
    pub total_rows: usize,
}

/// Narrow, blocking view of the analytical store.
///
/// Implementations are shared process-wide and invoked from `spawn_blocking`.
pub trait AnalyticalStore: Send + Sync {
    /// Runs `sql` verbatim. Only the first `max_rows` rows are converted;
    /// the rest are counted.
    fn run(&self, sql: &str, max_rows: usize) -> Result<RowSet, StoreError>;

    /// Markdown description of the queryable tables, embedded in the system prompt.
    fn describe_schema(&self) -> Result<String, StoreError>;
}
