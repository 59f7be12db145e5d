//! Host-side table plumbing: declarative columns, key-column qualifiers and
//! row sinks. A table turns each API record into a `Row` by resolving its
//! column bindings against the record's serialized (wire-shaped) form.

pub mod cost_forecast;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use crate::data::cost_explorer::partition_for_region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Timestamp,
    Double,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::String => "TEXT",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Double => "REAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    String(String),
    Timestamp(DateTime<Utc>),
    Double(f64),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => Ok(()),
            ColumnValue::String(s) => f.write_str(s),
            ColumnValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            ColumnValue::Double(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionField {
    Partition,
    Region,
}

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Echo of a key-column qualifier
    Qual(&'static str),
    /// Dotted path into the serialized record, e.g. `TimePeriod.Start`
    Field(&'static str),
    Connection(ConnectionField),
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub description: &'static str,
    pub column_type: ColumnType,
    pub source: ColumnSource,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub description: &'static str,
    /// Qualifiers that must be supplied for a list call
    pub key_columns: &'static [&'static str],
    pub columns: Vec<ColumnDef>,
}

/// Key-column qualifiers supplied by the query, by column name
#[derive(Debug, Clone, Default)]
pub struct KeyColumnQuals {
    values: HashMap<String, String>,
}

impl KeyColumnQuals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get_string_value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Per-query context handed to a table's list function
#[derive(Debug, Clone, Default)]
pub struct QueryData {
    pub key_column_quals: KeyColumnQuals,
}

impl QueryData {
    pub fn new(key_column_quals: KeyColumnQuals) -> Self {
        Self { key_column_quals }
    }
}

/// One output row, values in column declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<(&'static str, ColumnValue)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}

/// Receives rows one at a time as a table streams them
pub trait RowSink {
    fn stream_row(&mut self, row: Row) -> Result<()>;

    /// Flush anything buffered once the list call is done
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Values a row can draw from besides the record itself
pub struct RowContext<'a> {
    pub quals: &'a KeyColumnQuals,
    pub region: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Column {column}: cannot convert {value} to {column_type:?}")]
    Conversion {
        column: &'static str,
        value: String,
        column_type: ColumnType,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Columns every table carries, appended after its own
pub fn with_common_columns(mut columns: Vec<ColumnDef>) -> Vec<ColumnDef> {
    columns.push(ColumnDef {
        name: "partition",
        description: "The AWS partition in which the resource is located (aws, aws-cn, or aws-us-gov).",
        column_type: ColumnType::String,
        source: ColumnSource::Connection(ConnectionField::Partition),
    });
    columns.push(ColumnDef {
        name: "region",
        description: "The AWS Region in which the resource is located.",
        column_type: ColumnType::String,
        source: ColumnSource::Connection(ConnectionField::Region),
    });
    columns
}

impl TableDef {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn row_for<T: Serialize>(&self, item: &T, ctx: &RowContext<'_>) -> Result<Row, TransformError> {
        let record = serde_json::to_value(item)?;

        let values = self
            .columns
            .iter()
            .map(|column| {
                let raw = match &column.source {
                    ColumnSource::Qual(name) => ctx
                        .quals
                        .get_string_value(name)
                        .map(|v| Value::String(v.to_string())),
                    ColumnSource::Field(path) => lookup_path(&record, path).cloned(),
                    ColumnSource::Connection(ConnectionField::Region) => {
                        Some(Value::String(ctx.region.to_string()))
                    }
                    ColumnSource::Connection(ConnectionField::Partition) => {
                        Some(Value::String(partition_for_region(ctx.region).to_string()))
                    }
                };
                convert(column, raw).map(|value| (column.name, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Row { values })
    }
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

fn convert(column: &ColumnDef, raw: Option<Value>) -> Result<ColumnValue, TransformError> {
    let raw = match raw {
        None | Some(Value::Null) => return Ok(ColumnValue::Null),
        Some(raw) => raw,
    };

    let converted = match (column.column_type, &raw) {
        (ColumnType::String, Value::String(s)) => Some(ColumnValue::String(s.clone())),
        (ColumnType::String, other) => Some(ColumnValue::String(other.to_string())),
        (ColumnType::Double, Value::Number(n)) => n.as_f64().map(ColumnValue::Double),
        (ColumnType::Double, Value::String(s)) => s.trim().parse().ok().map(ColumnValue::Double),
        (ColumnType::Timestamp, Value::String(s)) => parse_timestamp(s).map(ColumnValue::Timestamp),
        _ => None,
    };

    converted.ok_or_else(|| TransformError::Conversion {
        column: column.name,
        value: raw.to_string(),
        column_type: column.column_type,
    })
}

/// RFC 3339, or a bare `YYYY-MM-DD` date taken as midnight UTC
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &'static str, column_type: ColumnType, source: ColumnSource) -> ColumnDef {
        ColumnDef {
            name,
            description: "",
            column_type,
            source,
        }
    }

    #[test]
    fn test_lookup_nested_path() {
        let value = json!({ "TimePeriod": { "Start": "2026-10-15" } });
        assert_eq!(lookup_path(&value, "TimePeriod.Start"), Some(&json!("2026-10-15")));
        assert_eq!(lookup_path(&value, "TimePeriod.End"), None);
        assert_eq!(lookup_path(&value, "Missing.Start"), None);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("2026-10-15"),
            Some(Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2026-10-15T08:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2026, 10, 15, 6, 30, 0).unwrap())
        );
        assert_eq!(parse_timestamp("15/10/2026"), None);
    }

    #[test]
    fn test_row_resolves_all_sources() {
        let table = TableDef {
            name: "t",
            description: "",
            key_columns: &["granularity"],
            columns: with_common_columns(vec![
                column("granularity", ColumnType::String, ColumnSource::Qual("granularity")),
                column("start", ColumnType::Timestamp, ColumnSource::Field("TimePeriod.Start")),
                column("value", ColumnType::Double, ColumnSource::Field("Value")),
                column("absent", ColumnType::Double, ColumnSource::Field("Nope")),
            ]),
        };
        let quals = KeyColumnQuals::new().with("granularity", "daily");
        let ctx = RowContext { quals: &quals, region: "cn-north-1" };

        let row = table
            .row_for(&json!({ "TimePeriod": { "Start": "2026-10-15" }, "Value": "1.5" }), &ctx)
            .unwrap();

        assert_eq!(
            table.column_names(),
            vec!["granularity", "start", "value", "absent", "partition", "region"]
        );
        assert_eq!(row.get("granularity"), Some(&ColumnValue::String("daily".to_string())));
        assert_eq!(
            row.get("start"),
            Some(&ColumnValue::Timestamp(Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap()))
        );
        assert_eq!(row.get("value"), Some(&ColumnValue::Double(1.5)));
        assert_eq!(row.get("absent"), Some(&ColumnValue::Null));
        assert_eq!(row.get("partition"), Some(&ColumnValue::String("aws-cn".to_string())));
        assert_eq!(row.get("region"), Some(&ColumnValue::String("cn-north-1".to_string())));
    }

    #[test]
    fn test_bad_value_is_conversion_error() {
        let table = TableDef {
            name: "t",
            description: "",
            key_columns: &[],
            columns: vec![column("start", ColumnType::Timestamp, ColumnSource::Field("Start"))],
        };
        let quals = KeyColumnQuals::new();
        let ctx = RowContext { quals: &quals, region: "us-east-1" };

        let err = table.row_for(&json!({ "Start": 42 }), &ctx).unwrap_err();
        assert!(matches!(err, TransformError::Conversion { column: "start", .. }));
    }

    #[test]
    fn test_column_value_display() {
        assert_eq!(ColumnValue::Null.to_string(), "");
        assert_eq!(ColumnValue::Double(12.25).to_string(), "12.25");
        assert_eq!(
            ColumnValue::Timestamp(Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap()).to_string(),
            "2026-10-15T00:00:00+00:00"
        );
    }
}
