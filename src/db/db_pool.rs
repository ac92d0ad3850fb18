use duckdb::types::Value;
use duckdb::{AccessMode, Config, Connection};
use r2d2::{ManageConnection, Pool};

use super::codec::StoreValue;
use super::schema_manager;
use super::{AnalyticalStore, RowSet, StoreError};

pub struct DuckDBConnectionManager {
    connection_string: String,
    read_only: bool,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: String, read_only: bool) -> Self {
        Self {
            connection_string,
            read_only,
        }
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let access_mode = if self.read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let config = Config::default().access_mode(access_mode)?;
        Connection::open_with_flags(&self.connection_string, config)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pooled DuckDB ledger database.
pub struct DuckDbStore {
    pool: Pool<DuckDBConnectionManager>,
}

impl DuckDbStore {
    pub fn new(pool: Pool<DuckDBConnectionManager>) -> Self {
        Self { pool }
    }
}

impl AnalyticalStore for DuckDbStore {
    fn run(&self, sql: &str, max_rows: usize) -> Result<RowSet, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        // Column names are only known once the statement has run
        let columns = rows
            .as_ref()
            .map(|stmt| stmt.column_names())
            .unwrap_or_default();

        let mut collected = Vec::new();
        let mut total_rows = 0;
        while let Some(row) = rows.next()? {
            total_rows += 1;
            // Rows past the cap are counted, never converted
            if collected.len() >= max_rows {
                continue;
            }
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(StoreValue::from(row.get::<_, Value>(i)?));
            }
            collected.push(values);
        }

        Ok(RowSet {
            columns,
            rows: collected,
            total_rows,
        })
    }

    fn describe_schema(&self) -> Result<String, StoreError> {
        let conn = self.pool.get()?;
        Ok(schema_manager::describe_tables(&conn)?)
    }
}

/// Single-connection in-memory store, seeded with `setup`.
#[cfg(test)]
pub fn memory_store(setup: &str) -> DuckDbStore {
    let pool = Pool::builder()
        .max_size(1)
        .build(DuckDBConnectionManager::new(":memory:".to_string(), false))
        .unwrap();
    if !setup.is_empty() {
        pool.get().unwrap().execute_batch(setup).unwrap();
    }
    DuckDbStore::new(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_returns_columns_in_result_order() {
        let store = memory_store(
            "CREATE TABLE ap_transactions (party VARCHAR, amount_gbp DOUBLE);
             INSERT INTO ap_transactions VALUES ('Acme', 10.0), ('Bolt', 2.5);",
        );

        let rows = store
            .run("SELECT amount_gbp, party FROM ap_transactions ORDER BY party", 50)
            .unwrap();

        assert_eq!(rows.columns, vec!["amount_gbp", "party"]);
        assert_eq!(
            rows.rows,
            vec![
                vec![StoreValue::Number(10.0), StoreValue::Text("Acme".into())],
                vec![StoreValue::Number(2.5), StoreValue::Text("Bolt".into())],
            ]
        );
    }

    #[test]
    fn test_rows_past_the_cap_are_only_counted() {
        let store = memory_store("");

        let rows = store.run("SELECT range FROM range(2000000)", 50).unwrap();

        assert_eq!(rows.rows.len(), 50);
        assert_eq!(rows.total_rows, 2_000_000);
        assert_eq!(rows.rows[49], vec![StoreValue::Integer(49)]);
    }

    #[test]
    fn test_unknown_column_is_a_query_error() {
        let store = memory_store("CREATE TABLE contracts (supplier VARCHAR);");

        let err = store.run("SELECT no_such_column FROM contracts", 50).unwrap_err();

        assert!(matches!(err, StoreError::Query(_)));
        assert!(err.to_string().contains("no_such_column"));
    }

    #[test]
    fn test_read_only_connections_reject_writes() {
        let dir = std::env::temp_dir().join(format!("nl-ledger-ro-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ledger.duckdb");
        let path_str = path.to_string_lossy().to_string();

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE contracts (supplier VARCHAR);").unwrap();
        }

        let pool = Pool::builder()
            .max_size(1)
            .build(DuckDBConnectionManager::new(path_str, true))
            .unwrap();
        let store = DuckDbStore::new(pool);

        assert!(store.run("SELECT * FROM contracts", 50).is_ok());
        assert!(store.run("DROP TABLE contracts", 50).is_err());

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
