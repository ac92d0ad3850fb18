use duckdb::Connection;
use tracing::debug;

/// One column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Lists every user table and its columns as markdown for the generator's system prompt.
pub fn describe_tables(conn: &Connection) -> Result<String, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT table_schema, table_name, column_name, data_type, is_nullable
         FROM information_schema.columns
         WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
         ORDER BY table_schema, table_name, ordinal_position",
    )?;

    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnDescription {
                table_schema: row.get(0)?,
                table_name: row.get(1)?,
                column_name: row.get(2)?,
                data_type: row.get(3)?,
                nullable: row.get::<_, String>(4)? == "YES",
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Described {} columns for the schema prompt", columns.len());
    Ok(render_schema(&columns))
}

/// Renders column descriptions grouped by table, in the order given.
pub fn render_schema(columns: &[ColumnDescription]) -> String {
    let mut metadata = String::from("# DATABASE SCHEMA\n\n");

    if columns.is_empty() {
        metadata.push_str("No tables found.\n");
        return metadata;
    }

    let mut current: Option<(&str, &str)> = None;
    for column in columns {
        let key = (column.table_schema.as_str(), column.table_name.as_str());
        if current != Some(key) {
            if current.is_some() {
                metadata.push('\n');
            }
            // The default schema needs no qualifier in queries
            if column.table_schema == "main" {
                metadata.push_str(&format!("### Table: {}\n\n", column.table_name));
            } else {
                metadata.push_str(&format!(
                    "### Table: {}.{}\n\n",
                    column.table_schema, column.table_name
                ));
            }
            metadata.push_str("| Column Name | Data Type | Nullable |\n");
            metadata.push_str("|------------|-----------|----------|\n");
            current = Some(key);
        }

        metadata.push_str(&format!(
            "| {} | {} | {} |\n",
            column.column_name,
            column.data_type,
            if column.nullable { "YES" } else { "NO" }
        ));
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::memory_store;
    use crate::db::AnalyticalStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_groups_columns_by_table() {
        let col = |table: &str, name: &str, ty: &str, nullable: bool| ColumnDescription {
            table_schema: "main".to_string(),
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: ty.to_string(),
            nullable,
        };

        let rendered = render_schema(&[
            col("ap_transactions", "party", "VARCHAR", true),
            col("ap_transactions", "amount_gbp", "DECIMAL(18,2)", false),
            col("contracts", "supplier", "VARCHAR", true),
        ]);

        assert_eq!(
            rendered,
            "# DATABASE SCHEMA\n\n\
             ### Table: ap_transactions\n\n\
             | Column Name | Data Type | Nullable |\n\
             |------------|-----------|----------|\n\
             | party | VARCHAR | YES |\n\
             | amount_gbp | DECIMAL(18,2) | NO |\n\
             \n\
             ### Table: contracts\n\n\
             | Column Name | Data Type | Nullable |\n\
             |------------|-----------|----------|\n\
             | supplier | VARCHAR | YES |\n"
        );
    }

    #[test]
    fn test_render_empty_schema() {
        assert_eq!(render_schema(&[]), "# DATABASE SCHEMA\n\nNo tables found.\n");
    }

    #[test]
    fn test_describe_live_tables() {
        let store = memory_store(
            "CREATE TABLE contracts (supplier VARCHAR NOT NULL, end_date DATE);",
        );

        let schema = store.describe_schema().unwrap();

        assert!(schema.contains("### Table: contracts"));
        assert!(schema.contains("| supplier | VARCHAR | NO |"));
        assert!(schema.contains("| end_date | DATE | YES |"));
    }
}
