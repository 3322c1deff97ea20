//! Raw cell text to typed values

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

use crate::schema::ColumnType;

/// Values the export service writes for "no answer"
pub const MISSING_SENTINELS: [&str; 2] = ["-999999999", "##N/A##"];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A cell ready to be bound; temporal values are kept as canonical text
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null(ColumnType),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null(_) => f.write_str("NULL"),
            CellValue::Integer(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(v) => f.write_str(v),
        }
    }
}

pub fn is_missing(raw: &str) -> bool {
    raw.is_empty() || MISSING_SENTINELS.contains(&raw)
}

/// Parse `raw` as `column_type`; `None` means the text is not a valid value
pub fn coerce(raw: &str, column_type: ColumnType) -> Option<CellValue> {
    if is_missing(raw) {
        return Some(CellValue::Null(column_type));
    }

    let value = match column_type {
        ColumnType::Integer => CellValue::Integer(raw.trim().parse().ok()?),
        ColumnType::Float => {
            let value: f64 = raw.trim().parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            CellValue::Float(value)
        }
        ColumnType::Date => {
            let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()?;
            CellValue::Text(date.format(DATE_FORMAT).to_string())
        }
        ColumnType::Time => {
            let time = NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()?;
            CellValue::Text(time.format(TIME_FORMAT).to_string())
        }
        ColumnType::DateTime => {
            let stamp = NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT).ok()?;
            CellValue::Text(stamp.format(DATETIME_FORMAT).to_string())
        }
        ColumnType::Text => CellValue::Text(raw.to_string()),
    };
    Some(value)
}
