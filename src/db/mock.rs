//! In-process stores for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::codec::StoreValue;
use super::{AnalyticalStore, RowSet, StoreError};

/// Returns the same rows for every statement and records what it was asked to run.
pub struct StaticStore {
    row_set: RowSet,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticStore {
    pub fn new(columns: Vec<&str>, rows: Vec<Vec<StoreValue>>) -> Self {
        Self {
            row_set: RowSet {
                columns: columns.into_iter().map(String::from).collect(),
                total_rows: rows.len(),
                rows,
            },
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl AnalyticalStore for StaticStore {
    fn run(&self, sql: &str, max_rows: usize) -> Result<RowSet, StoreError> {
        self.calls.lock().unwrap().push(sql.to_string());
        Ok(RowSet {
            columns: self.row_set.columns.clone(),
            rows: self.row_set.rows.iter().take(max_rows).cloned().collect(),
            total_rows: self.row_set.total_rows,
        })
    }

    fn describe_schema(&self) -> Result<String, StoreError> {
        Ok(format!("# DATABASE SCHEMA\n\ncolumns: {}\n", self.row_set.columns.join(", ")))
    }
}

/// Sleeps before answering with an empty result.
pub struct SlowStore(pub Duration);

impl AnalyticalStore for SlowStore {
    fn run(&self, _sql: &str, _max_rows: usize) -> Result<RowSet, StoreError> {
        std::thread::sleep(self.0);
        Ok(RowSet::default())
    }

    fn describe_schema(&self) -> Result<String, StoreError> {
        Ok(String::new())
    }
}
