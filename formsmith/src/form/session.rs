use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::layout::{FormRow, group_rows};
use super::validation::{ValidationError, validate};
use super::value::{DataKind, TypedValue, is_empty};
use super::widget::{RenderedField, Widget};
use crate::dropdown::DropdownResolver;
use crate::export::DocumentField;
use crate::field::lower_first;
use crate::schema::{Record, SchemaError, SchemaService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum FormMode {
    Create,
    Edit { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormState {
    Loading,
    Ready,
    Submitting,
    Success,
    Rejected,
}

// ---------- errors ----------

#[derive(Debug)]
pub enum FormError {
    /// The operation is not allowed in the session's current state.
    InvalidState { state: FormState, action: &'static str },
    UnknownField(String),
    /// Hidden and disabled fields do not accept edits.
    NotEditable(String),
    /// Loading the record being edited failed.
    Load(SchemaError),
    Invalid(ValidationError),
    /// The data service refused the create or update.
    Rejected(SchemaError),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::InvalidState { state, action } => {
                write!(f, "Cannot {action} while the form is {state:?}")
            }
            FormError::UnknownField(name) => write!(f, "Unknown field '{name}'"),
            FormError::NotEditable(name) => write!(f, "Field '{name}' is not editable"),
            FormError::Load(e) => write!(f, "Failed to load record: {e}"),
            FormError::Invalid(e) => write!(f, "{e}"),
            FormError::Rejected(e) => write!(f, "Save failed: {e}"),
        }
    }
}

impl std::error::Error for FormError {}

// ---------- layout ----------

/// Snapshot of a form ready to draw.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormLayout {
    pub table: String,
    #[serde(flatten)]
    pub mode: FormMode,
    pub state: FormState,
    /// Last validation or save message, if any.
    pub message: Option<String>,
    pub rows: Vec<FormRow<RenderedField>>,
}

// ---------- session ----------

/// One record being created or edited through a configured form.
///
/// The session owns its working values and its dropdown cache; nothing is
/// written back into the configuration it was built from.
pub struct FormSession {
    service: Arc<dyn SchemaService>,
    table: String,
    mode: FormMode,
    fields: Vec<DocumentField>,
    values: Record,
    dropdowns: DropdownResolver,
    state: FormState,
    message: Option<String>,
}

impl FormSession {
    pub fn new(
        service: Arc<dyn SchemaService>,
        table: impl Into<String>,
        fields: Vec<DocumentField>,
        mode: FormMode,
    ) -> Self {
        Self {
            dropdowns: DropdownResolver::new(service.clone()),
            service,
            table: table.into(),
            mode,
            fields,
            values: Record::new(),
            state: FormState::Loading,
            message: None,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    /// Resolve dynamic dropdowns and bind working values. `Loading → Ready`.
    ///
    /// When editing, the existing row is fetched first; a failed fetch leaves
    /// the session in `Loading` so the caller can retry.
    pub async fn load(&mut self) -> Result<(), FormError> {
        self.require(&[FormState::Loading], "load")?;

        let existing = match &self.mode {
            FormMode::Create => None,
            FormMode::Edit { id } => {
                let row = self
                    .service
                    .get_row_by_id(&self.table, id)
                    .await
                    .map_err(|e| {
                        tracing::error!(table = %self.table, id = %id, error = %e, "record load failed");
                        FormError::Load(e)
                    })?;
                Some(row)
            }
        };

        self.dropdowns.resolve_all(&self.fields).await;
        self.values = match existing {
            Some(row) => bind_existing(&self.fields, &row),
            None => initial_values(&self.fields),
        };
        self.state = FormState::Ready;
        tracing::debug!(table = %self.table, fields = self.fields.len(), "form ready");
        Ok(())
    }

    /// Visible fields grouped into rows; hidden fields are left out.
    pub fn layout(&self) -> FormLayout {
        let visible: Vec<DocumentField> = self
            .fields
            .iter()
            .filter(|f| f.is_visible())
            .cloned()
            .collect();
        let rows = group_rows(&visible)
            .into_iter()
            .map(|row| {
                row.map(|field| {
                    let widget = Widget::for_field(field, self.dropdowns.options(&field.name));
                    let value = self.values.get(&field.name).cloned().unwrap_or(Value::Null);
                    RenderedField::new(field, widget, value)
                })
            })
            .collect();
        FormLayout {
            table: self.table.clone(),
            mode: self.mode.clone(),
            state: self.state,
            message: self.message.clone(),
            rows,
        }
    }

    /// Edit one working value. An edit after a rejected save returns the form to `Ready`.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), FormError> {
        self.require(&[FormState::Ready, FormState::Rejected], "edit")?;
        let field = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        if !field.is_visible() || !field.is_enabled() {
            return Err(FormError::NotEditable(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        if self.state == FormState::Rejected {
            self.state = FormState::Ready;
            self.message = None;
        }
        Ok(())
    }

    /// Validate against the current configuration, then persist.
    ///
    /// A validation failure keeps the form `Ready` with the message set; a
    /// refused save moves it to `Rejected`. Returns the persisted record.
    pub async fn submit(&mut self) -> Result<Record, FormError> {
        self.require(&[FormState::Ready, FormState::Rejected], "submit")?;

        if let Err(e) = validate(&self.fields, &self.values) {
            self.state = FormState::Ready;
            self.message = Some(e.message.clone());
            return Err(FormError::Invalid(e));
        }

        self.state = FormState::Submitting;
        self.message = None;
        let payload = self.payload();
        let result = match &self.mode {
            FormMode::Create => self.service.create_row(&self.table, &payload).await,
            FormMode::Edit { id } => self
                .service
                .update_row(&self.table, id, &payload)
                .await
                .map(|()| payload),
        };

        match result {
            Ok(record) => {
                self.state = FormState::Success;
                tracing::info!(table = %self.table, "record saved");
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(table = %self.table, error = %e, "record save rejected");
                self.state = FormState::Rejected;
                self.message = Some(e.to_string());
                Err(FormError::Rejected(e))
            }
        }
    }

    /// Encode working values to wire JSON. Empty primary keys are left for
    /// the data service to assign on create.
    fn payload(&self) -> Record {
        let creating = self.mode == FormMode::Create;
        let mut out = Record::new();
        for field in &self.fields {
            let raw = self.values.get(&field.name).unwrap_or(&Value::Null);
            if is_empty(raw) {
                if !(creating && field.is_primary_key) {
                    out.insert(field.name.clone(), Value::Null);
                }
                continue;
            }
            let encoded = TypedValue::decode(DataKind::of(&field.data_type), raw)
                .map(|v| v.to_json())
                // hidden fields skip validation and go out as loaded
                .unwrap_or_else(|_| raw.clone());
            out.insert(field.name.clone(), encoded);
        }
        out
    }

    fn require(&self, allowed: &[FormState], action: &'static str) -> Result<(), FormError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(FormError::InvalidState {
                state: self.state,
                action,
            })
        }
    }
}

/// Create-mode starting values: empty, except integer primary keys start at 0.
pub fn initial_values(fields: &[DocumentField]) -> Record {
    fields
        .iter()
        .map(|f| {
            let value = if f.is_primary_key && DataKind::of(&f.data_type).is_integer() {
                Value::from(0)
            } else {
                Value::String(String::new())
            };
            (f.name.clone(), value)
        })
        .collect()
}

fn bind_existing(fields: &[DocumentField], row: &Record) -> Record {
    fields
        .iter()
        .map(|f| {
            let value = row
                .get(&f.name)
                .or_else(|| row.get(&lower_first(&f.name)))
                .cloned()
                .unwrap_or(Value::Null);
            (f.name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Enability, FieldValue, InputType, OptionMap, SENTINEL, Visibility};
    use crate::schema::mock::MockSchemaService;
    use serde_json::json;

    fn field(name: &str, data_type: &str, row: u32) -> DocumentField {
        DocumentField {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: false,
            is_primary_key: false,
            foreign_key_table: SENTINEL.to_string(),
            primary_key_of_foreign_key_table: SENTINEL.to_string(),
            input_type: InputType::Textbox,
            value: FieldValue::Spec(SENTINEL.to_string()),
            display_name: name.to_string(),
            row_number: row,
            sequence: 1,
            visibility: Visibility::Visible,
            enability: Enability::Enabled,
            child_table: None,
        }
    }

    fn user_fields() -> Vec<DocumentField> {
        let mut id = field("id", "Int32", 1);
        id.is_primary_key = true;
        let mut team = field("teamId", "Int32", 2);
        team.input_type = InputType::DynamicDropdown;
        team.foreign_key_table = "Teams".to_string();
        team.value = FieldValue::Spec("teamId-title".to_string());
        let mut token = field("token", "String", 3);
        token.visibility = Visibility::Hidden;
        let mut created = field("createdAt", "DateTime", 4);
        created.enability = Enability::Disabled;
        created.is_nullable = true;
        vec![id, field("name", "String", 1), team, token, created]
    }

    fn service() -> Arc<MockSchemaService> {
        Arc::new(
            MockSchemaService::new()
                .with_rows("Teams", vec![json!({"teamId": 7, "title": "core"})])
                .with_rows(
                    "Users",
                    vec![json!({"id": 1, "name": "ada", "teamId": 7, "token": "t", "createdAt": null})],
                ),
        )
    }

    #[tokio::test]
    async fn test_create_flow() {
        let svc = service();
        let mut form = FormSession::new(svc.clone(), "Users", user_fields(), FormMode::Create);
        assert_eq!(form.state(), FormState::Loading);
        form.load().await.unwrap();
        assert_eq!(form.state(), FormState::Ready);
        assert_eq!(form.values()["id"], json!(0));
        assert_eq!(form.values()["name"], json!(""));

        form.set_value("name", json!("grace")).unwrap();
        form.set_value("teamId", json!("7")).unwrap();
        let saved = form.submit().await.unwrap();
        assert_eq!(form.state(), FormState::Success);
        assert_eq!(saved["teamId"], json!(7));
        assert_eq!(saved["name"], json!("grace"));
        assert_eq!(saved["createdAt"], Value::Null);
        assert_eq!(svc.rows_of("Users").len(), 2);
    }

    #[tokio::test]
    async fn test_layout_omits_hidden_and_resolves_dropdowns() {
        let mut form = FormSession::new(service(), "Users", user_fields(), FormMode::Create);
        form.load().await.unwrap();
        let layout = form.layout();

        let names: Vec<&str> = layout
            .rows
            .iter()
            .flat_map(|r| r.cells.iter().map(|c| c.name.as_str()))
            .collect();
        assert_eq!(names, vec!["id", "name", "teamId", "createdAt"]);
        let team = &layout.rows[1].cells[0];
        let expected: OptionMap = [("7".to_string(), "core".to_string())].into_iter().collect();
        assert_eq!(team.widget, Widget::Select { options: expected });
        assert!(layout.rows[2].cells[0].disabled);
        assert!(!layout.rows[0].cells[0].required);
    }

    #[tokio::test]
    async fn test_validation_failure_stays_ready() {
        let mut form = FormSession::new(service(), "Users", user_fields(), FormMode::Create);
        form.load().await.unwrap();
        form.set_value("name", json!("grace")).unwrap();
        form.set_value("teamId", json!("7.5")).unwrap();

        let err = form.submit().await.unwrap_err();
        assert!(matches!(err, FormError::Invalid(ref v) if v.field == "teamId"));
        assert_eq!(form.state(), FormState::Ready);
        assert_eq!(form.message(), Some("Enter valid integer for teamId"));
    }

    #[tokio::test]
    async fn test_disabled_and_hidden_reject_edits() {
        let mut form = FormSession::new(service(), "Users", user_fields(), FormMode::Create);
        assert!(matches!(
            form.set_value("name", json!("x")),
            Err(FormError::InvalidState { .. })
        ));
        form.load().await.unwrap();
        assert!(matches!(
            form.set_value("createdAt", json!("2024-01-01T00:00")),
            Err(FormError::NotEditable(_))
        ));
        assert!(matches!(
            form.set_value("token", json!("x")),
            Err(FormError::NotEditable(_))
        ));
        assert!(matches!(
            form.set_value("nope", json!("x")),
            Err(FormError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_flow_updates_existing_row() {
        let svc = service();
        let mut form = FormSession::new(
            svc.clone(),
            "Users",
            user_fields(),
            FormMode::Edit { id: "1".to_string() },
        );
        form.load().await.unwrap();
        assert_eq!(form.values()["name"], json!("ada"));
        assert_eq!(form.values()["token"], json!("t"));

        form.set_value("name", json!("ada l.")).unwrap();
        form.submit().await.unwrap();
        let rows = svc.rows_of("Users");
        assert_eq!(rows[0]["name"], json!("ada l."));
        assert_eq!(rows[0]["token"], json!("t"));
    }

    #[tokio::test]
    async fn test_missing_record_keeps_loading() {
        let mut form = FormSession::new(
            service(),
            "Users",
            user_fields(),
            FormMode::Edit { id: "99".to_string() },
        );
        assert!(matches!(form.load().await, Err(FormError::Load(_))));
        assert_eq!(form.state(), FormState::Loading);
    }

    #[tokio::test]
    async fn test_rejected_save_then_edit_returns_to_ready() {
        let svc = Arc::new(MockSchemaService::new().failing("Users"));
        let mut form = FormSession::new(svc, "Users", vec![field("name", "String", 1)], FormMode::Create);
        form.load().await.unwrap();
        form.set_value("name", json!("grace")).unwrap();

        assert!(matches!(form.submit().await, Err(FormError::Rejected(_))));
        assert_eq!(form.state(), FormState::Rejected);
        assert!(form.message().is_some());

        form.set_value("name", json!("grace h.")).unwrap();
        assert_eq!(form.state(), FormState::Ready);
        assert!(form.message().is_none());
    }
}
