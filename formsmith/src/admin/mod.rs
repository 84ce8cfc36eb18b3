use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::editor::EditorError;
use crate::enrich::EnrichError;
use crate::form::FormError;
use crate::schema::{SchemaError, SchemaService};

pub mod config_handlers;
pub mod dto;
pub mod form_handlers;
pub mod grid_handlers;
pub mod session_store;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AdminState {
    pub schema: Arc<dyn SchemaService>,
    /// Open configuration sessions.
    pub sessions: Arc<Mutex<session_store::SessionStore>>,
}

impl AdminState {
    pub fn new(schema: Arc<dyn SchemaService>) -> Self {
        Self {
            schema,
            sessions: Arc::new(Mutex::new(session_store::SessionStore::new())),
        }
    }
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status.
#[derive(Debug)]
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNPROCESSABLE_ENTITY, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

impl From<SchemaError> for ApiErr {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::NotFound(_) => ApiErr::not_found(e.to_string()),
            _ => ApiErr::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

impl From<EditorError> for ApiErr {
    fn from(e: EditorError) -> Self {
        match e {
            EditorError::UnknownField { .. } | EditorError::NoChildTable => {
                ApiErr::not_found(e.to_string())
            }
            EditorError::UnknownFieldSet(_) => ApiErr::bad_request(e.to_string()),
            EditorError::InvalidPlacement { .. } | EditorError::Export(_) => {
                ApiErr::unprocessable(e.to_string())
            }
            EditorError::Enrich(EnrichError::Metadata { source, .. }) => source.into(),
        }
    }
}

impl From<FormError> for ApiErr {
    fn from(e: FormError) -> Self {
        match e {
            FormError::UnknownField(_) => ApiErr::bad_request(e.to_string()),
            FormError::NotEditable(_) | FormError::InvalidState { .. } => {
                ApiErr::conflict(e.to_string())
            }
            FormError::Invalid(_) => ApiErr::unprocessable(e.to_string()),
            FormError::Load(source) | FormError::Rejected(source) => source.into(),
        }
    }
}

// ---------- router ----------

/// Admin API router. An empty `allowed_origins` means same-origin only;
/// `ui_dir` is served for every path the API does not match.
pub fn admin_router(
    state: AdminState,
    allowed_origins: &[String],
    ui_dir: Option<PathBuf>,
) -> Router {
    let allowed_origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    };

    let router = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1());
    let router = match ui_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1() -> Router<AdminState> {
    Router::new()
        // schema
        .route("/entities", get(config_handlers::list_entities))
        // configuration sessions
        .route("/sessions", post(config_handlers::open_session))
        .route(
            "/sessions/{id}",
            get(config_handlers::get_session).delete(config_handlers::close_session),
        )
        .route(
            "/sessions/{id}/fields/{set}/{name}",
            put(config_handlers::patch_field),
        )
        .route(
            "/sessions/{id}/child",
            put(config_handlers::link_child).delete(config_handlers::unlink_child),
        )
        .route("/sessions/{id}/export", get(config_handlers::export_session))
        // forms
        .route("/forms/layout", post(form_handlers::layout))
        .route("/forms/validate", post(form_handlers::validate))
        .route("/forms/submit", post(form_handlers::submit))
        // grids
        .route("/tables/{table}/grid", get(grid_handlers::grid_page))
        .route(
            "/tables/{table}/rows/{id}",
            axum::routing::delete(grid_handlers::delete_row),
        )
}
