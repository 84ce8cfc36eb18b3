use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::admin::dto::*;
use crate::admin::{AdminState, ApiErr};
use crate::editor::{ConfigEditor, FieldPatch, FieldSet};
use crate::export::DOCUMENT_FILE_NAME;

async fn session_editor(state: &AdminState, id: &str) -> Result<Arc<Mutex<ConfigEditor>>, ApiErr> {
    state
        .sessions
        .lock()
        .await
        .editor(id)
        .ok_or_else(|| ApiErr::not_found("Session not found"))
}

// ---------- GET /entities ----------

pub async fn list_entities(State(state): State<AdminState>) -> Result<Json<Vec<String>>, ApiErr> {
    let entities = state.schema.list_entities().await?;
    Ok(Json(entities))
}

// ---------- POST /sessions ----------

pub async fn open_session(
    State(state): State<AdminState>,
    Json(body): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiErr> {
    if body.table.trim().is_empty() {
        return Err(ApiErr::bad_request("table is required"));
    }

    let editor = match body.document {
        Some(document) => ConfigEditor::from_document(&body.table, &document),
        None => ConfigEditor::open(state.schema.as_ref(), &body.table).await?,
    };
    let response_editor = editor.clone();
    let id = state.sessions.lock().await.open(editor);

    tracing::info!(session = %id, table = %body.table, "configuration session opened");
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(id, &response_editor)),
    ))
}

// ---------- GET /sessions/{id} ----------

pub async fn get_session(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiErr> {
    let editor = session_editor(&state, &id).await?;
    let editor = editor.lock().await;
    Ok(Json(SessionResponse::new(id, &editor)))
}

// ---------- DELETE /sessions/{id} ----------

pub async fn close_session(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    if !state.sessions.lock().await.close(&id) {
        return Err(ApiErr::not_found("Session not found"));
    }
    tracing::info!(session = %id, "configuration session closed");
    Ok(StatusCode::NO_CONTENT)
}

// ---------- PUT /sessions/{id}/fields/{set}/{name} ----------

pub async fn patch_field(
    State(state): State<AdminState>,
    Path((id, set, name)): Path<(String, String, String)>,
    Json(patch): Json<FieldPatch>,
) -> Result<Json<SessionResponse>, ApiErr> {
    let set: FieldSet = set.parse()?;
    let editor = session_editor(&state, &id).await?;
    let mut editor = editor.lock().await;
    editor.apply_patch(set, &name, patch)?;
    Ok(Json(SessionResponse::new(id, &editor)))
}

// ---------- PUT /sessions/{id}/child ----------

pub async fn link_child(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<LinkChildRequest>,
) -> Result<Json<SessionResponse>, ApiErr> {
    let editor = session_editor(&state, &id).await?;
    let mut editor = editor.lock().await;
    editor
        .set_child_table(state.schema.as_ref(), &body.field, &body.table)
        .await?;
    Ok(Json(SessionResponse::new(id, &editor)))
}

// ---------- DELETE /sessions/{id}/child ----------

pub async fn unlink_child(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiErr> {
    let editor = session_editor(&state, &id).await?;
    let mut editor = editor.lock().await;
    editor.unlink_child()?;
    Ok(Json(SessionResponse::new(id, &editor)))
}

// ---------- GET /sessions/{id}/export ----------

pub async fn export_session(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Response, ApiErr> {
    let editor = session_editor(&state, &id).await?;
    let document = editor.lock().await.export()?;
    tracing::info!(
        session = %id,
        fields = document.main_table_fields.len(),
        child = %document.child_table_fields.table_name,
        "configuration exported"
    );

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{DOCUMENT_FILE_NAME}\""))
        .map_err(ApiErr::internal)?;
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(document)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnMetadata;
    use crate::schema::mock::MockSchemaService;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request},
        routing::{get, post, put},
    };
    use tower::ServiceExt;

    fn make_state() -> AdminState {
        let service = MockSchemaService::new()
            .with_table(
                "Orders",
                vec![
                    ColumnMetadata::new("Id", "System.Int32").primary_key(),
                    ColumnMetadata::new("UserId", "System.Int32").references("Users"),
                    ColumnMetadata::new("Gender", "System.String"),
                ],
            )
            .with_table(
                "OrderLines",
                vec![ColumnMetadata::new("Sku", "System.String")],
            )
            .with_primary_key("Users", "UserId")
            .failing("Broken");
        AdminState::new(Arc::new(service))
    }

    fn make_router(state: AdminState) -> Router {
        Router::new()
            .route("/entities", get(list_entities))
            .route("/sessions", post(open_session))
            .route("/sessions/{id}", get(get_session).delete(close_session))
            .route("/sessions/{id}/fields/{set}/{name}", put(patch_field))
            .route("/sessions/{id}/child", put(link_child).delete(unlink_child))
            .route("/sessions/{id}/export", get(export_session))
            .with_state(state)
    }

    fn json_request(method: Method, uri: &str, value: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&value).unwrap()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn open(state: &AdminState, table: &str) -> String {
        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/sessions",
                serde_json::json!({ "table": table }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        body_json(res).await["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn list_entities_ok() {
        let res = make_router(make_state())
            .oneshot(empty_request(Method::GET, "/entities"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, serde_json::json!(["OrderLines", "Orders"]));
    }

    #[tokio::test]
    async fn open_session_enriches_table() {
        let state = make_state();
        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/sessions",
                serde_json::json!({ "table": "Orders" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let body = body_json(res).await;
        assert_eq!(body["table"], "Orders");
        assert_eq!(body["fields"][1]["name"], "userId");
        assert_eq!(body["fields"][1]["primaryKeyOfForeignKeyTable"], "UserId");
        assert!(body["child"].is_null());
        assert_eq!(state.sessions.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn open_unknown_table_not_found() {
        let res = make_router(make_state())
            .oneshot(json_request(
                Method::POST,
                "/sessions",
                serde_json::json!({ "table": "Nope" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body_json(res).await["error"].as_str().unwrap().contains("Nope"));
    }

    #[tokio::test]
    async fn open_failing_table_bad_gateway() {
        let res = make_router(make_state())
            .oneshot(json_request(
                Method::POST,
                "/sessions",
                serde_json::json!({ "table": "Broken" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn patch_input_type_rederives_value() {
        let state = make_state();
        let id = open(&state, "Orders").await;

        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::PUT,
                &format!("/sessions/{id}/fields/main/userId"),
                serde_json::json!({ "inputType": "Dynamic dropdown", "displayName": "User" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["fields"][1]["value"], "UserId-columnName");
        assert_eq!(body["fields"][1]["displayName"], "User");
    }

    #[tokio::test]
    async fn patch_errors() {
        let state = make_state();
        let id = open(&state, "Orders").await;

        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::PUT,
                &format!("/sessions/{id}/fields/main/missing"),
                serde_json::json!({ "displayName": "x" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::PUT,
                &format!("/sessions/{id}/fields/side/userId"),
                serde_json::json!({ "displayName": "x" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::PUT,
                &format!("/sessions/{id}/fields/main/userId"),
                serde_json::json!({ "rowNumber": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn link_child_then_export() {
        let state = make_state();
        let id = open(&state, "Orders").await;

        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::PUT,
                &format!("/sessions/{id}/child"),
                serde_json::json!({ "field": "id", "table": "OrderLines" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["child"]["tableName"], "OrderLines");
        assert_eq!(body["child"]["parentField"], "id");
        assert!(body["child"].get("table_name").is_none());
        assert_eq!(body["fields"][0]["childTable"], "OrderLines");

        let res = make_router(state.clone())
            .oneshot(empty_request(Method::GET, &format!("/sessions/{id}/export")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"tableFieldData.json\""
        );
        let doc = body_json(res).await;
        assert_eq!(doc["childTableFields"]["tableName"], "OrderLines");
        assert_eq!(doc["childTableFields"]["fields"][0]["name"], "sku");
        assert_eq!(doc["mainTableFields"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn export_with_malformed_option_unprocessable() {
        let state = make_state();
        let id = open(&state, "Orders").await;

        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::PUT,
                &format!("/sessions/{id}/fields/main/gender"),
                serde_json::json!({ "inputType": "Static dropdown", "value": "0-Male,oops" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = make_router(state.clone())
            .oneshot(empty_request(Method::GET, &format!("/sessions/{id}/export")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(res).await["error"].as_str().unwrap().contains("oops"));
    }

    #[tokio::test]
    async fn unlink_without_child_not_found() {
        let state = make_state();
        let id = open(&state, "Orders").await;
        let res = make_router(state.clone())
            .oneshot(empty_request(Method::DELETE, &format!("/sessions/{id}/child")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reopen_from_document() {
        let state = make_state();
        let document = serde_json::json!({
            "mainTableFields": [{
                "name": "gender",
                "dataType": "String",
                "isNullable": true,
                "isPrimaryKey": false,
                "foreignKeyTable": "-",
                "primaryKeyOfForeignKeyTable": "-",
                "inputType": "Radio group",
                "value": { "f": "Female", "m": "Male" },
                "displayName": "Gender",
                "rowNumber": 1,
                "sequence": 1,
                "visibility": "Visible",
                "enability": "Enabled"
            }],
            "childTableFields": { "tableName": "", "fields": [] }
        });
        let res = make_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/sessions",
                serde_json::json!({ "table": "People", "document": document }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["fields"][0]["value"], "f-Female,m-Male");
    }

    #[tokio::test]
    async fn close_session_then_gone() {
        let state = make_state();
        let id = open(&state, "Orders").await;

        let res = make_router(state.clone())
            .oneshot(empty_request(Method::DELETE, &format!("/sessions/{id}")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = make_router(state.clone())
            .oneshot(empty_request(Method::GET, &format!("/sessions/{id}")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
