pub mod csv;
pub mod sqlite;

use anyhow::{Context, Result};
use std::io;
use crate::config::{OutputConfig, OutputFormat};
use crate::table::{Row, RowSink, TableDef};

pub use self::csv::CsvSink;
pub use self::sqlite::SqliteSink;

/// Collects rows in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Vec<Row>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

impl RowSink for MemorySink {
    fn stream_row(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }
}

/// Open the sink selected by the output config for `table`
pub fn open_sink(output: &OutputConfig, table: &TableDef) -> Result<Box<dyn RowSink>> {
    let sink: Box<dyn RowSink> = match (output.format, output.path.as_deref()) {
        (OutputFormat::Csv, Some(path)) => Box::new(CsvSink::create(path, table)?),
        (OutputFormat::Csv, None) => Box::new(CsvSink::new(io::stdout(), table)?),
        (OutputFormat::Sqlite, path) => {
            let path = path.context("SQLite output requires an output path")?;
            Box::new(SqliteSink::open(path, table)?)
        }
    };
    Ok(sink)
}
