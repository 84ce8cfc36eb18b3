//! Operator-driven editing of enriched field records.
//!
//! The working set holds each record behind an `Arc`; every setter swaps in a
//! fresh `Arc` for exactly one record and leaves all others untouched, so a
//! snapshot taken before an edit never observes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::enrich::{self, EnrichError};
use crate::export::{self, ConfigurationDocument, ExportError};
use crate::field::{Enability, FieldConfig, FieldValue, InputType, SENTINEL, Visibility};
use crate::schema::SchemaService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    Main,
    Child,
}

impl std::str::FromStr for FieldSet {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(FieldSet::Main),
            "child" => Ok(FieldSet::Child),
            other => Err(EditorError::UnknownFieldSet(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum EditorError {
    UnknownField { set: FieldSet, name: String },
    UnknownFieldSet(String),
    NoChildTable,
    /// Row numbers and sequences are 1-based.
    InvalidPlacement { name: String, attribute: &'static str },
    Enrich(EnrichError),
    Export(ExportError),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::UnknownField { set, name } => {
                write!(f, "No field named '{name}' in the {set:?} field set")
            }
            EditorError::UnknownFieldSet(s) => write!(f, "Unknown field set: {s}"),
            EditorError::NoChildTable => write!(f, "No child table is linked"),
            EditorError::InvalidPlacement { name, attribute } => {
                write!(f, "{attribute} of '{name}' must be at least 1")
            }
            EditorError::Enrich(e) => write!(f, "{e}"),
            EditorError::Export(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<EnrichError> for EditorError {
    fn from(e: EnrichError) -> Self {
        EditorError::Enrich(e)
    }
}

impl From<ExportError> for EditorError {
    fn from(e: ExportError) -> Self {
        EditorError::Export(e)
    }
}

/// The single child table linked under one parent field.
#[derive(Debug, Clone)]
pub struct ChildFieldSet {
    pub table_name: String,
    pub parent_field: String,
    pub fields: Vec<Arc<FieldConfig>>,
}

/// Partial update of one field, one optional entry per mutable attribute.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    pub input_type: Option<InputType>,
    pub display_name: Option<String>,
    pub row_number: Option<u32>,
    pub sequence: Option<u32>,
    pub visibility: Option<Visibility>,
    pub enability: Option<Enability>,
    pub value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigEditor {
    table: String,
    fields: Vec<Arc<FieldConfig>>,
    child: Option<ChildFieldSet>,
}

impl ConfigEditor {
    pub fn new(table: impl Into<String>, fields: Vec<FieldConfig>) -> Self {
        Self {
            table: table.into(),
            fields: fields.into_iter().map(Arc::new).collect(),
            child: None,
        }
    }

    /// Enrich `table` and open an editor on the result.
    pub async fn open(service: &dyn SchemaService, table: &str) -> Result<Self, EditorError> {
        let fields = enrich::enrich_table(service, table).await?;
        Ok(Self::new(table, fields))
    }

    /// Re-open a previously exported document.
    ///
    /// Option mappings are turned back into their delimited form so the
    /// working set has a single value encoding.
    pub fn from_document(table: impl Into<String>, document: &ConfigurationDocument) -> Self {
        let mut editor = Self::new(table, decode_fields(&document.main_table_fields));
        let child = &document.child_table_fields;
        if !child.table_name.is_empty() {
            let parent_field = document
                .main_table_fields
                .iter()
                .find(|f| f.child_table.as_deref() == Some(child.table_name.as_str()))
                .map(|f| f.name.clone())
                .unwrap_or_default();
            editor.child = Some(ChildFieldSet {
                table_name: child.table_name.clone(),
                parent_field,
                fields: decode_fields(&child.fields).into_iter().map(Arc::new).collect(),
            });
        }
        editor
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[Arc<FieldConfig>] {
        &self.fields
    }

    pub fn child(&self) -> Option<&ChildFieldSet> {
        self.child.as_ref()
    }

    pub fn field(&self, set: FieldSet, name: &str) -> Option<&Arc<FieldConfig>> {
        self.set(set).ok()?.iter().find(|f| f.name == name)
    }

    fn set(&self, set: FieldSet) -> Result<&Vec<Arc<FieldConfig>>, EditorError> {
        match set {
            FieldSet::Main => Ok(&self.fields),
            FieldSet::Child => self
                .child
                .as_ref()
                .map(|c| &c.fields)
                .ok_or(EditorError::NoChildTable),
        }
    }

    fn set_mut(&mut self, set: FieldSet) -> Result<&mut Vec<Arc<FieldConfig>>, EditorError> {
        match set {
            FieldSet::Main => Ok(&mut self.fields),
            FieldSet::Child => self
                .child
                .as_mut()
                .map(|c| &mut c.fields)
                .ok_or(EditorError::NoChildTable),
        }
    }

    /// Copy-on-write update of the named record.
    fn update(
        &mut self,
        set: FieldSet,
        name: &str,
        edit: impl FnOnce(&mut FieldConfig) -> Result<(), EditorError>,
    ) -> Result<(), EditorError> {
        let fields = self.set_mut(set)?;
        let slot = fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| EditorError::UnknownField {
                set,
                name: name.to_string(),
            })?;
        let mut record = FieldConfig::clone(slot);
        edit(&mut record)?;
        *slot = Arc::new(record);
        Ok(())
    }

    /// Switch the widget and re-derive its value, discarding whatever was typed before.
    pub fn set_input_type(
        &mut self,
        set: FieldSet,
        name: &str,
        input_type: InputType,
    ) -> Result<(), EditorError> {
        self.update(set, name, |f| {
            f.input_type = input_type;
            f.value = input_type.default_value(&f.primary_key_of_foreign_key_table);
            Ok(())
        })
    }

    pub fn set_display_name(
        &mut self,
        set: FieldSet,
        name: &str,
        display_name: impl Into<String>,
    ) -> Result<(), EditorError> {
        let display_name = display_name.into();
        self.update(set, name, |f| {
            f.display_name = display_name;
            Ok(())
        })
    }

    pub fn set_row_number(&mut self, set: FieldSet, name: &str, row: u32) -> Result<(), EditorError> {
        self.update(set, name, |f| {
            if row == 0 {
                return Err(EditorError::InvalidPlacement {
                    name: f.name.clone(),
                    attribute: "rowNumber",
                });
            }
            f.row_number = row;
            Ok(())
        })
    }

    pub fn set_sequence(&mut self, set: FieldSet, name: &str, sequence: u32) -> Result<(), EditorError> {
        self.update(set, name, |f| {
            if sequence == 0 {
                return Err(EditorError::InvalidPlacement {
                    name: f.name.clone(),
                    attribute: "sequence",
                });
            }
            f.sequence = sequence;
            Ok(())
        })
    }

    pub fn set_visibility(
        &mut self,
        set: FieldSet,
        name: &str,
        visibility: Visibility,
    ) -> Result<(), EditorError> {
        self.update(set, name, |f| {
            f.visibility = visibility;
            Ok(())
        })
    }

    pub fn set_enability(
        &mut self,
        set: FieldSet,
        name: &str,
        enability: Enability,
    ) -> Result<(), EditorError> {
        self.update(set, name, |f| {
            f.enability = enability;
            Ok(())
        })
    }

    /// Replace the raw value spec. Checked for well-formedness only at export.
    pub fn set_value(
        &mut self,
        set: FieldSet,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), EditorError> {
        let value = value.into();
        self.update(set, name, |f| {
            f.value = value;
            Ok(())
        })
    }

    /// Apply every attribute present in `patch`. The input type goes first so
    /// an explicit value in the same patch overrides the derived one.
    pub fn apply_patch(
        &mut self,
        set: FieldSet,
        name: &str,
        patch: FieldPatch,
    ) -> Result<(), EditorError> {
        // Resolve the field up front so a bad name fails before anything changes.
        self.set(set)?
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EditorError::UnknownField {
                set,
                name: name.to_string(),
            })?;
        if patch.row_number == Some(0) {
            return Err(EditorError::InvalidPlacement {
                name: name.to_string(),
                attribute: "rowNumber",
            });
        }
        if patch.sequence == Some(0) {
            return Err(EditorError::InvalidPlacement {
                name: name.to_string(),
                attribute: "sequence",
            });
        }

        if let Some(input_type) = patch.input_type {
            self.set_input_type(set, name, input_type)?;
        }
        if let Some(display_name) = patch.display_name {
            self.set_display_name(set, name, display_name)?;
        }
        if let Some(row) = patch.row_number {
            self.set_row_number(set, name, row)?;
        }
        if let Some(sequence) = patch.sequence {
            self.set_sequence(set, name, sequence)?;
        }
        if let Some(visibility) = patch.visibility {
            self.set_visibility(set, name, visibility)?;
        }
        if let Some(enability) = patch.enability {
            self.set_enability(set, name, enability)?;
        }
        if let Some(value) = patch.value {
            self.set_value(set, name, value)?;
        }
        Ok(())
    }

    /// Link `child_table` under the main-table field `parent_field`.
    ///
    /// Runs a fresh enrichment pass for the child and replaces any previously
    /// linked child set wholesale; the previous parent field loses its link.
    pub async fn set_child_table(
        &mut self,
        service: &dyn SchemaService,
        parent_field: &str,
        child_table: &str,
    ) -> Result<(), EditorError> {
        if self.field(FieldSet::Main, parent_field).is_none() {
            return Err(EditorError::UnknownField {
                set: FieldSet::Main,
                name: parent_field.to_string(),
            });
        }

        let child_fields = enrich::link_child_table(service, parent_field, child_table).await?;

        if let Some(previous) = self.child.take()
            && previous.parent_field != parent_field
        {
            self.clear_child_link(&previous.parent_field)?;
        }
        self.update(FieldSet::Main, parent_field, |f| {
            f.child_table = Some(child_table.to_string());
            Ok(())
        })?;
        self.child = Some(ChildFieldSet {
            table_name: child_table.to_string(),
            parent_field: parent_field.to_string(),
            fields: child_fields.into_iter().map(Arc::new).collect(),
        });

        tracing::info!(
            table = %self.table,
            parent_field = %parent_field,
            child_table = %child_table,
            "linked child table"
        );
        Ok(())
    }

    /// Drop the child field set and the parent field's link to it.
    pub fn unlink_child(&mut self) -> Result<(), EditorError> {
        let previous = self.child.take().ok_or(EditorError::NoChildTable)?;
        self.clear_child_link(&previous.parent_field)
    }

    fn clear_child_link(&mut self, parent_field: &str) -> Result<(), EditorError> {
        if self.field(FieldSet::Main, parent_field).is_none() {
            return Ok(());
        }
        self.update(FieldSet::Main, parent_field, |f| {
            f.child_table = None;
            Ok(())
        })
    }

    /// Validate value specs and build the export document. The working set is not touched.
    pub fn export(&self) -> Result<ConfigurationDocument, EditorError> {
        let main: Vec<FieldConfig> = self.fields.iter().map(|f| FieldConfig::clone(f)).collect();
        let child = self.child.as_ref().map(|c| {
            (
                c.table_name.as_str(),
                c.fields.iter().map(|f| FieldConfig::clone(f)).collect::<Vec<_>>(),
            )
        });
        let child = child.as_ref().map(|(table, fields)| (*table, fields.as_slice()));
        Ok(export::serialize(&main, child)?)
    }
}

fn decode_fields(fields: &[FieldConfig<FieldValue>]) -> Vec<FieldConfig> {
    fields
        .iter()
        .map(|f| {
            f.map_value(|v| {
                Ok::<_, std::convert::Infallible>(match v {
                    FieldValue::Spec(s) => s.clone(),
                    FieldValue::Options(map) if map.is_empty() => SENTINEL.to_string(),
                    FieldValue::Options(map) => map.to_delimited(),
                })
            })
            .unwrap_or_else(|never| match never {})
        })
        .collect()
}
