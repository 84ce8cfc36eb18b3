use serde::{Deserialize, Serialize};

use crate::editor::{ChildFieldSet, ConfigEditor, FieldSet};
use crate::export::{ConfigurationDocument, DocumentField};
use crate::field::FieldConfig;
use crate::schema::Record;

// ---------- session requests ----------

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub table: String,
    /// A previous export to continue editing instead of enriching from scratch.
    pub document: Option<ConfigurationDocument>,
}

#[derive(Debug, Deserialize)]
pub struct LinkChildRequest {
    /// Main-table field the child hangs off.
    pub field: String,
    pub table: String,
}

// ---------- session responses ----------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub table: String,
    pub fields: Vec<FieldConfig>,
    pub child: Option<ChildResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildResponse {
    pub table_name: String,
    pub parent_field: String,
    pub fields: Vec<FieldConfig>,
}

impl From<&ChildFieldSet> for ChildResponse {
    fn from(c: &ChildFieldSet) -> Self {
        Self {
            table_name: c.table_name.clone(),
            parent_field: c.parent_field.clone(),
            fields: c.fields.iter().map(|f| FieldConfig::clone(f)).collect(),
        }
    }
}

impl SessionResponse {
    pub fn new(id: String, editor: &ConfigEditor) -> Self {
        Self {
            id,
            table: editor.table().to_string(),
            fields: editor.fields().iter().map(|f| FieldConfig::clone(f)).collect(),
            child: editor.child().map(ChildResponse::from),
        }
    }
}

// ---------- form requests ----------

fn main_set() -> FieldSet {
    FieldSet::Main
}

#[derive(Debug, Deserialize)]
pub struct FormLayoutRequest {
    /// Target table for the main field set; the child set names its own.
    pub table: Option<String>,
    pub document: ConfigurationDocument,
    #[serde(default = "main_set")]
    pub set: FieldSet,
    /// Edit an existing row instead of creating one.
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormSubmitRequest {
    #[serde(flatten)]
    pub form: FormLayoutRequest,
    pub values: Record,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub fields: Vec<DocumentField>,
    #[serde(default)]
    pub values: Record,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub error: Option<String>,
    pub field: Option<String>,
}
