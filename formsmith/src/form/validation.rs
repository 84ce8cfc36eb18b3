use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::value::{DataKind, TypedValue, is_empty};
use crate::field::FieldConfig;
use crate::schema::Record;

/// First violation found, with a message fit to show the user as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check `values` against `fields` in field order and stop at the first violation.
///
/// Hidden fields are skipped. An empty value fails a non-nullable column
/// before its type is considered; primary keys may stay empty since the data
/// service assigns them.
pub fn validate<V>(fields: &[FieldConfig<V>], values: &Record) -> Result<(), ValidationError> {
    for field in fields.iter().filter(|f| f.is_visible()) {
        let value = values.get(&field.name).unwrap_or(&Value::Null);
        if is_empty(value) {
            if field.is_nullable || field.is_primary_key {
                continue;
            }
            return Err(ValidationError {
                field: field.name.clone(),
                message: format!("{} is required", field.display_name),
            });
        }

        let kind = DataKind::of(&field.data_type);
        if TypedValue::decode(kind, value).is_err() {
            return Err(ValidationError {
                field: field.name.clone(),
                message: kind.violation(&field.name),
            });
        }
    }
    Ok(())
}
