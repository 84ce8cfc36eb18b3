use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::{Enability, InputType, Visibility};

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

/// One row as returned by the schema service.
pub type Record = serde_json::Map<String, serde_json::Value>;

// ---------- DTOs ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub principal_table: String,
}

/// Raw column descriptor from `GetEntityMetadata`.
///
/// The presentation keys are optional; the service echoes them when an
/// earlier export has been merged back into its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    /// Composite runtime type string, e.g. "System.Int32, mscorlib, ..."
    #[serde(rename = "clrTypeName", alias = "runtimeTypeDescriptor")]
    pub type_descriptor: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enability: Option<Enability>,
}

impl ColumnMetadata {
    /// Bare descriptor with no keys and no prior presentation attributes.
    pub fn new(name: impl Into<String>, type_descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_descriptor: type_descriptor.into(),
            is_nullable: false,
            is_primary_key: false,
            foreign_keys: Vec::new(),
            input_type: None,
            display_name: None,
            row_number: None,
            sequence: None,
            visibility: None,
            enability: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.foreign_keys.push(ForeignKey {
            principal_table: table.into(),
        });
        self
    }
}

// ---------- errors ----------

#[derive(Debug)]
pub enum SchemaError {
    /// The service could not be reached or the connection broke.
    Transport(String),
    /// The service answered with a non-success status.
    Status { status: u16, url: String },
    /// The body was not the expected JSON shape.
    Decode(String),
    NotFound(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Transport(msg) => write!(f, "Schema service unreachable: {msg}"),
            SchemaError::Status { status, url } => {
                write!(f, "Schema service returned {status} for {url}")
            }
            SchemaError::Decode(msg) => write!(f, "Unexpected schema service response: {msg}"),
            SchemaError::NotFound(what) => write!(f, "Not found: {what}"),
        }
    }
}

impl std::error::Error for SchemaError {}

// ---------- trait ----------

/// The schema/data service the configurator and renderers talk to.
#[async_trait::async_trait]
pub trait SchemaService: Send + Sync {
    async fn list_entities(&self) -> Result<Vec<String>, SchemaError>;

    async fn get_column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>, SchemaError>;

    /// Name of `table`'s primary key column, or `None` when the service reports none.
    async fn get_primary_key_name(&self, table: &str) -> Result<Option<String>, SchemaError>;

    async fn get_rows(&self, table: &str) -> Result<Vec<Record>, SchemaError>;

    async fn get_row_by_id(&self, table: &str, id: &str) -> Result<Record, SchemaError>;

    async fn create_row(&self, table: &str, values: &Record) -> Result<Record, SchemaError>;

    async fn update_row(&self, table: &str, id: &str, values: &Record) -> Result<(), SchemaError>;

    async fn delete_row(&self, table: &str, id: &str) -> Result<(), SchemaError>;

    /// Rows of a foreign table, used to populate dynamic dropdowns.
    async fn get_related_rows(&self, foreign_table: &str) -> Result<Vec<Record>, SchemaError>;
}

/// Render a JSON scalar the way it appears in a form control or an id path segment.
pub fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
