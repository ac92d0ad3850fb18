use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::codec::serialize;
use super::statement_guard::StatementPolicy;
use super::{AnalyticalStore, RowSet, StoreError};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("statement rejected: {0}")]
    Rejected(String),
    #[error("query timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("query task failed: {0}")]
    Task(String),
}

/// Columns plus at most `max_rows` JSON-safe rows; `total_rows` is the uncapped count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub total_rows: usize,
}

impl QueryResult {
    pub fn from_row_set(row_set: RowSet, max_rows: usize) -> Self {
        let total_rows = row_set.total_rows.max(row_set.rows.len());
        let rows = row_set
            .rows
            .iter()
            .take(max_rows)
            .map(|row| row.iter().map(serialize).collect())
            .collect();

        Self {
            columns: row_set.columns,
            rows,
            total_rows,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.total_rows > self.rows.len()
    }
}

/// Runs one extracted statement against the shared store.
pub struct QueryExecutor {
    store: Arc<dyn AnalyticalStore>,
    policy: StatementPolicy,
    max_rows: usize,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(
        store: Arc<dyn AnalyticalStore>,
        policy: StatementPolicy,
        max_rows: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            max_rows,
            timeout,
        }
    }

    pub fn policy(&self) -> StatementPolicy {
        self.policy
    }

    /// Executes `statement` once. No retries; the first failure is returned.
    pub async fn execute(&self, statement: &str) -> Result<QueryResult, ExecutionError> {
        if let Some(reason) = self.policy.violation(statement) {
            warn!("Refusing to execute statement: {}", reason);
            return Err(ExecutionError::Rejected(reason));
        }

        let start_time = Instant::now();
        let store = Arc::clone(&self.store);
        let sql = statement.to_string();
        let max_rows = self.max_rows;

        // DuckDB calls block, keep them off the async workers
        let task = tokio::task::spawn_blocking(move || store.run(&sql, max_rows));

        let row_set = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!("Query exceeded {}s, abandoning it", self.timeout.as_secs());
                return Err(ExecutionError::Timeout(self.timeout));
            }
            Ok(Err(join_err)) => return Err(ExecutionError::Task(join_err.to_string())),
            Ok(Ok(result)) => result?,
        };

        let result = QueryResult::from_row_set(row_set, self.max_rows);
        info!(
            "Query executed successfully. Row count: {}, Execution time: {}ms",
            result.total_rows,
            start_time.elapsed().as_millis()
        );
        if result.is_truncated() {
            debug!("Keeping {} of {} rows", result.rows.len(), result.total_rows);
        }

        Ok(result)
    }
}
