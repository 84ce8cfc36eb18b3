//! Configuration serializer: working set → portable document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::field::{FieldConfig, FieldValue, OptionMap, SENTINEL};

/// Default file name renderers import the document from.
pub const DOCUMENT_FILE_NAME: &str = "tableFieldData.json";

pub type DocumentField = FieldConfig<FieldValue>;

/// The only state handed from the configurator to the renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDocument {
    pub main_table_fields: Vec<DocumentField>,
    pub child_table_fields: ChildTableFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildTableFields {
    /// Empty when no child table is linked.
    pub table_name: String,
    pub fields: Vec<DocumentField>,
}

impl ConfigurationDocument {
    pub fn has_child(&self) -> bool {
        !self.child_table_fields.table_name.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self).map_err(|e| ExportError::Io(e.to_string()))
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json).map_err(|e| ExportError::Io(format!("{}: {e}", path.display())))
    }

    pub fn read_from(path: &Path) -> Result<Self, ExportError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ExportError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| ExportError::Io(format!("{}: {e}", path.display())))
    }
}

// ---------- errors ----------

#[derive(Debug, PartialEq)]
pub enum ExportError {
    /// A delimited option value has a pair without `-`.
    MalformedValueSpec { field: String, pair: String },
    Io(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::MalformedValueSpec { field, pair } => write!(
                f,
                "Value of '{field}' has malformed option '{pair}' (expected key-label)"
            ),
            ExportError::Io(msg) => write!(f, "Document I/O failed: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}

// ---------- serialization ----------

/// Report the first field whose option-style value does not parse.
pub fn check_value_specs(fields: &[FieldConfig]) -> Result<(), ExportError> {
    fields.iter().try_for_each(|f| encode_value(f).map(|_| ()))
}

/// Build the export document. Inputs are borrowed and never modified.
pub fn serialize(
    main: &[FieldConfig],
    child: Option<(&str, &[FieldConfig])>,
) -> Result<ConfigurationDocument, ExportError> {
    let main_table_fields = encode_fields(main)?;
    let child_table_fields = match child {
        Some((table_name, fields)) => ChildTableFields {
            table_name: table_name.to_string(),
            fields: encode_fields(fields)?,
        },
        None => ChildTableFields::default(),
    };
    Ok(ConfigurationDocument {
        main_table_fields,
        child_table_fields,
    })
}

fn encode_fields(fields: &[FieldConfig]) -> Result<Vec<DocumentField>, ExportError> {
    fields
        .iter()
        .map(|f| f.map_value(|_| encode_value(f)))
        .collect()
}

fn encode_value(field: &FieldConfig) -> Result<FieldValue, ExportError> {
    if !field.input_type.exports_option_map() {
        return Ok(FieldValue::Spec(field.value.clone()));
    }
    if field.value.is_empty() || field.value == SENTINEL {
        return Ok(FieldValue::Options(OptionMap::new()));
    }
    OptionMap::parse_delimited(&field.value)
        .map(FieldValue::Options)
        .map_err(|pair| ExportError::MalformedValueSpec {
            field: field.name.clone(),
            pair,
        })
}
