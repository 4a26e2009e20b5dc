//! # Report Encoding
//!
//! Encodes tabular query results as a JSON object keyed `"row 1"`,
//! `"row 2"`, ... Dates and timestamps become ISO-8601 strings and
//! fixed-point numbers become floats.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::db::SubmissionRow;

/// Scale of coordinates stored as millionths of a degree
pub const COORDINATE_SCALE: u32 = 6;

/// One cell of a report row
#[derive(Debug, Clone, PartialEq)]
pub enum ReportValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// `units / 10^scale`
    Fixed { units: i64, scale: u32 },
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl ReportValue {
    pub fn fixed(units: i64, scale: u32) -> Self {
        ReportValue::Fixed { units, scale }
    }
}

impl Serialize for ReportValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReportValue::Null => serializer.serialize_none(),
            ReportValue::Bool(value) => serializer.serialize_bool(*value),
            ReportValue::Integer(value) => serializer.serialize_i64(*value),
            ReportValue::Float(value) => serializer.serialize_f64(*value),
            ReportValue::Fixed { units, scale } => {
                serializer.serialize_f64(*units as f64 / 10f64.powi(*scale as i32))
            }
            ReportValue::Text(value) => serializer.serialize_str(value),
            ReportValue::Date(value) => {
                serializer.serialize_str(&value.format("%Y-%m-%d").to_string())
            }
            ReportValue::DateTime(value) => serializer.serialize_str(&value.to_rfc3339()),
        }
    }
}

/// A report row: column names with their values, in column order
pub type ReportRow = Vec<(String, ReportValue)>;

/// Encode rows as `{"row 1": {...}, "row 2": {...}}`
pub fn encode_rows<I>(rows: I) -> Value
where
    I: IntoIterator<Item = ReportRow>,
{
    let mut result = Map::new();
    for (index, row) in rows.into_iter().enumerate() {
        let mut columns = Map::new();
        for (column, value) in row {
            // ReportValue serialization cannot fail
            let value = serde_json::to_value(&value).unwrap_or(Value::Null);
            columns.insert(column, value);
        }
        result.insert(format!("row {}", index + 1), Value::Object(columns));
    }
    Value::Object(result)
}

impl From<SubmissionRow> for ReportRow {
    fn from(row: SubmissionRow) -> Self {
        vec![
            ("id".to_string(), ReportValue::Integer(row.id)),
            ("telegram_id".to_string(), ReportValue::Integer(row.telegram_id)),
            ("photo_ref".to_string(), ReportValue::Text(row.photo_ref)),
            (
                "latitude".to_string(),
                ReportValue::fixed(row.latitude_micro, COORDINATE_SCALE),
            ),
            (
                "longitude".to_string(),
                ReportValue::fixed(row.longitude_micro, COORDINATE_SCALE),
            ),
            ("created_at".to_string(), ReportValue::DateTime(row.created_at)),
        ]
    }
}
