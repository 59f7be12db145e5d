use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use crate::table::{ColumnValue, Row, RowSink, TableDef};

/// Inserts rows into a SQLite table named after the source table
pub struct SqliteSink {
    conn: Connection,
    insert_sql: String,
}

impl SqliteSink {
    pub fn open(db_path: &str, table: &TableDef) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path))?;
        Self::with_connection(conn, table)
    }

    pub fn with_connection(conn: Connection, table: &TableDef) -> Result<Self> {
        let column_defs = table
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.column_type.sql_type()))
            .collect::<Vec<_>>()
            .join(",\n                ");

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {}
            );
            "#,
            table.name, column_defs
        ))?;

        let names = table.column_names();
        let placeholders = (1..=names.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name,
            names.join(", "),
            placeholders
        );

        Ok(Self { conn, insert_sql })
    }
}

impl RowSink for SqliteSink {
    fn stream_row(&mut self, row: Row) -> Result<()> {
        let values = row.values.into_iter().map(|(_, value)| match value {
            ColumnValue::Null => Value::Null,
            ColumnValue::String(s) => Value::Text(s),
            ColumnValue::Timestamp(ts) => Value::Text(ts.to_rfc3339()),
            ColumnValue::Double(v) => Value::Real(v),
        });

        self.conn.execute(&self.insert_sql, params_from_iter(values))?;
        Ok(())
    }
}
