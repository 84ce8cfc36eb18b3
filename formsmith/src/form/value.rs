//! Typed form values.
//!
//! Widgets hand back loosely typed JSON (mostly strings). Each value is decoded
//! once, at the form boundary, into a [`TypedValue`] chosen by the column's
//! data type, and encoded back to wire JSON only when the record is submitted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    DateTime,
    Date,
    Time,
}

/// What a column's data type tag says about its values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataKind {
    /// `label` names SQL-style types whose violation message spells out the range.
    Integer {
        min: i128,
        max: i128,
        label: Option<&'static str>,
    },
    Decimal { label: &'static str },
    Temporal { kind: TemporalKind, label: &'static str },
    Character,
    Boolean,
    Binary,
    Other,
}

impl DataKind {
    /// Classify a data type tag, case-insensitively.
    pub fn of(data_type: &str) -> Self {
        let int = |min: i128, max: i128| DataKind::Integer { min, max, label: None };
        match data_type.to_ascii_lowercase().as_str() {
            "int32" | "int" | "integer" => int(i32::MIN.into(), i32::MAX.into()),
            "int64" | "long" => int(i64::MIN.into(), i64::MAX.into()),
            "int16" | "short" => int(i16::MIN.into(), i16::MAX.into()),
            "sbyte" => int(i8::MIN.into(), i8::MAX.into()),
            "byte" => int(0, u8::MAX.into()),
            "uint16" | "ushort" => int(0, u16::MAX.into()),
            "uint32" | "uint" => int(0, u32::MAX.into()),
            "uint64" | "ulong" => int(0, u64::MAX.into()),
            "tinyint" => DataKind::Integer {
                min: 0,
                max: u8::MAX.into(),
                label: Some("tinyint"),
            },
            "smallint" => DataKind::Integer {
                min: i16::MIN.into(),
                max: i16::MAX.into(),
                label: Some("smallint"),
            },
            "bigint" => DataKind::Integer {
                min: i64::MIN.into(),
                max: i64::MAX.into(),
                label: Some("bigint"),
            },
            "decimal" | "numeric" | "single" | "double" => DataKind::Decimal { label: "decimal" },
            "money" | "smallmoney" => DataKind::Decimal { label: "money" },
            "float" | "real" => DataKind::Decimal { label: "float/real" },
            "datetime" => DataKind::Temporal {
                kind: TemporalKind::DateTime,
                label: "datetime",
            },
            "datetime2" | "smalldatetime" | "datetimeoffset" => DataKind::Temporal {
                kind: TemporalKind::DateTime,
                label: "date/time",
            },
            "date" | "dateonly" => DataKind::Temporal {
                kind: TemporalKind::Date,
                label: "date/time",
            },
            "time" | "timeonly" | "timespan" => DataKind::Temporal {
                kind: TemporalKind::Time,
                label: "date/time",
            },
            "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" | "string" | "guid" => {
                DataKind::Character
            }
            "bit" | "boolean" | "bool" => DataKind::Boolean,
            "binary" | "varbinary" | "image" | "byte[]" => DataKind::Binary,
            _ => DataKind::Other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataKind::Integer { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataKind::Integer { .. } | DataKind::Decimal { .. })
    }

    /// Message shown when a value does not decode for this kind.
    pub fn violation(&self, field_name: &str) -> String {
        match self {
            DataKind::Integer {
                min,
                max,
                label: Some(label),
            } => format!("Enter valid {label} ({min} to {max}) for {field_name}"),
            DataKind::Integer { label: None, .. } => format!("Enter valid integer for {field_name}"),
            DataKind::Decimal { label } | DataKind::Temporal { label, .. } => {
                format!("Enter valid {label} for {field_name}")
            }
            DataKind::Character => format!("Enter valid string for {field_name}"),
            DataKind::Boolean => {
                format!("Enter valid boolean (0, 1, true, or false) for {field_name}")
            }
            DataKind::Binary => format!("Enter valid binary data for {field_name}"),
            DataKind::Other => format!("Enter valid value for {field_name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Integer(i128),
    Decimal(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Text(String),
    Boolean(bool),
    Binary(Vec<u8>),
    /// Data types with no decoding rule pass through untouched.
    Raw(Value),
}

/// The value was present but does not fit the column's kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError;

/// Null and blank strings count as "no value".
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

impl TypedValue {
    /// Decode a non-empty widget value for a column of `kind`.
    pub fn decode(kind: DataKind, raw: &Value) -> Result<TypedValue, DecodeError> {
        if is_empty(raw) {
            return Ok(TypedValue::Null);
        }
        match kind {
            DataKind::Integer { min, max, .. } => {
                let n: i128 = match raw {
                    Value::Number(n) => n
                        .as_i64()
                        .map(i128::from)
                        .or_else(|| n.as_u64().map(i128::from))
                        .ok_or(DecodeError)?,
                    Value::String(s) => s.trim().parse().map_err(|_| DecodeError)?,
                    _ => return Err(DecodeError),
                };
                if n < min || n > max {
                    return Err(DecodeError);
                }
                Ok(TypedValue::Integer(n))
            }
            DataKind::Decimal { .. } => {
                let n = match raw {
                    Value::Number(n) => n.as_f64().ok_or(DecodeError)?,
                    Value::String(s) => s.trim().parse::<f64>().map_err(|_| DecodeError)?,
                    _ => return Err(DecodeError),
                };
                if !n.is_finite() {
                    return Err(DecodeError);
                }
                Ok(TypedValue::Decimal(n))
            }
            DataKind::Temporal { kind, .. } => {
                let s = raw.as_str().ok_or(DecodeError)?.trim();
                match kind {
                    TemporalKind::DateTime => parse_datetime(s).map(TypedValue::DateTime),
                    TemporalKind::Date => parse_datetime(s).map(|dt| TypedValue::Date(dt.date())),
                    TemporalKind::Time => parse_time(s)
                        .or_else(|| parse_datetime(s).map(|dt| dt.time()))
                        .map(TypedValue::Time),
                }
                .ok_or(DecodeError)
            }
            DataKind::Character => match raw {
                Value::String(s) => Ok(TypedValue::Text(s.clone())),
                _ => Err(DecodeError),
            },
            DataKind::Boolean => match raw {
                Value::Bool(b) => Ok(TypedValue::Boolean(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(TypedValue::Boolean(false)),
                    Some(1) => Ok(TypedValue::Boolean(true)),
                    _ => Err(DecodeError),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "0" | "false" => Ok(TypedValue::Boolean(false)),
                    "1" | "true" => Ok(TypedValue::Boolean(true)),
                    _ => Err(DecodeError),
                },
                _ => Err(DecodeError),
            },
            DataKind::Binary => {
                let s = raw.as_str().ok_or(DecodeError)?;
                STANDARD
                    .decode(s.trim())
                    .map(TypedValue::Binary)
                    .map_err(|_| DecodeError)
            }
            DataKind::Other => Ok(TypedValue::Raw(raw.clone())),
        }
    }

    /// Wire JSON for submission.
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Integer(n) => {
                if let Ok(i) = i64::try_from(*n) {
                    Value::from(i)
                } else if let Ok(u) = u64::try_from(*n) {
                    Value::from(u)
                } else {
                    Value::String(n.to_string())
                }
            }
            TypedValue::Decimal(n) => {
                serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number)
            }
            TypedValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            TypedValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            TypedValue::Time(t) => Value::String(t.format("%H:%M:%S").to_string()),
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Binary(bytes) => Value::String(STANDARD.encode(bytes)),
            TypedValue::Raw(v) => v.clone(),
        }
    }
}
