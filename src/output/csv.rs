use anyhow::{anyhow, Context, Result};
use csv::{Writer, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use crate::table::{Row, RowSink, TableDef};

/// Writes rows as CSV, header first
pub struct CsvSink<W: Write> {
    writer: Writer<W>,
}

impl CsvSink<File> {
    /// Append to `path`. The header is only written when the file is new or empty.
    pub fn create(path: &str, table: &TableDef) -> Result<Self> {
        let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open CSV output: {}", path))?;

        let mut sink = Self {
            writer: WriterBuilder::new().from_writer(file),
        };
        if needs_header {
            sink.write_header(table)?;
        }
        Ok(sink)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, table: &TableDef) -> Result<Self> {
        let mut sink = Self {
            writer: WriterBuilder::new().from_writer(writer),
        };
        sink.write_header(table)?;
        Ok(sink)
    }

    fn write_header(&mut self, table: &TableDef) -> Result<()> {
        self.writer.write_record(table.column_names())?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV output: {}", e.error()))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn stream_row(&mut self, row: Row) -> Result<()> {
        self.writer
            .write_record(row.values.iter().map(|(_, value)| value.to_string()))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
