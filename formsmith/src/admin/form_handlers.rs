use axum::{extract::State, http::StatusCode, response::Json};

use crate::admin::dto::*;
use crate::admin::{AdminState, ApiErr};
use crate::editor::FieldSet;
use crate::form::{self, FormLayout, FormMode, FormSession};
use crate::schema::Record;

/// Pick the field set and target table a form request addresses, and load it.
async fn load_form(state: &AdminState, request: FormLayoutRequest) -> Result<FormSession, ApiErr> {
    let FormLayoutRequest {
        table,
        document,
        set,
        id,
    } = request;

    let (table, fields) = match set {
        FieldSet::Main => {
            let table = table
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| ApiErr::bad_request("table is required for the main field set"))?;
            (table, document.main_table_fields)
        }
        FieldSet::Child => {
            if !document.has_child() {
                return Err(ApiErr::not_found("No child table is linked"));
            }
            let child = document.child_table_fields;
            (child.table_name, child.fields)
        }
    };
    let mode = match id {
        Some(id) => FormMode::Edit { id },
        None => FormMode::Create,
    };

    let mut session = FormSession::new(state.schema.clone(), table, fields, mode);
    session.load().await?;
    Ok(session)
}

// ---------- POST /forms/layout ----------

pub async fn layout(
    State(state): State<AdminState>,
    Json(body): Json<FormLayoutRequest>,
) -> Result<Json<FormLayout>, ApiErr> {
    let session = load_form(&state, body).await?;
    Ok(Json(session.layout()))
}

// ---------- POST /forms/validate ----------

pub async fn validate(Json(body): Json<ValidateRequest>) -> Json<ValidateResponse> {
    match form::validate(&body.fields, &body.values) {
        Ok(()) => Json(ValidateResponse {
            error: None,
            field: None,
        }),
        Err(e) => Json(ValidateResponse {
            error: Some(e.message),
            field: Some(e.field),
        }),
    }
}

// ---------- POST /forms/submit ----------

pub async fn submit(
    State(state): State<AdminState>,
    Json(body): Json<FormSubmitRequest>,
) -> Result<(StatusCode, Json<Record>), ApiErr> {
    let creating = body.form.id.is_none();
    let mut session = load_form(&state, body.form).await?;
    for (name, value) in body.values {
        session.set_value(&name, value)?;
    }
    let record = session.submit().await?;
    let status = if creating {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(record)))
}
