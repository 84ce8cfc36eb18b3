use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::collections::HashMap;

use crate::admin::{AdminState, ApiErr};
use crate::grid::{GridPage, GridQuery, GridView};

// ---------- GET /tables/{table}/grid ----------

pub async fn grid_page(
    State(state): State<AdminState>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GridPage>, ApiErr> {
    let mut grid = GridView::new(state.schema.clone(), table);
    grid.load().await?;
    Ok(Json(grid.page(&GridQuery::from_params(&params))))
}

// ---------- DELETE /tables/{table}/rows/{id} ----------

pub async fn delete_row(
    State(state): State<AdminState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiErr> {
    let mut grid = GridView::new(state.schema.clone(), table);
    grid.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::mock::MockSchemaService;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request},
        routing::{delete, get},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn service() -> Arc<MockSchemaService> {
        Arc::new(
            MockSchemaService::new()
                .with_rows(
                    "Users",
                    vec![
                        serde_json::json!({"id": 1, "name": "Ada"}),
                        serde_json::json!({"id": 2, "name": "Grace"}),
                        serde_json::json!({"id": 3, "name": "Adele"}),
                    ],
                )
                .failing("Broken"),
        )
    }

    fn make_router(service: Arc<MockSchemaService>) -> Router {
        Router::new()
            .route("/tables/{table}/grid", get(grid_page))
            .route("/tables/{table}/rows/{id}", delete(delete_row))
            .with_state(AdminState::new(service))
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn grid_page_sorted_filtered() {
        let res = make_router(service())
            .oneshot(request(
                Method::GET,
                "/tables/Users/grid?sort=name&desc=true&filter.name=ad&page_size=1",
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["columns"], serde_json::json!(["id", "name", "Actions"]));
        assert_eq!(body["total"], 2);
        assert_eq!(body["page_size"], 1);
        assert_eq!(body["data"][0]["values"]["name"], "Adele");
        assert_eq!(body["data"][0]["actions"], serde_json::json!(["edit", "delete"]));
    }

    #[tokio::test]
    async fn grid_page_past_end_is_empty() {
        let res = make_router(service())
            .oneshot(request(
                Method::GET,
                "/tables/Users/grid?page=18446744073709551615",
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"], serde_json::json!([]));
        assert_eq!(body["total"], 3);
    }

    #[tokio::test]
    async fn grid_fetch_failure_bad_gateway() {
        let res = make_router(service())
            .oneshot(request(Method::GET, "/tables/Broken/grid"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn delete_row_then_missing() {
        let svc = service();
        let res = make_router(svc.clone())
            .oneshot(request(Method::DELETE, "/tables/Users/rows/2"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(svc.rows_of("Users").len(), 2);

        let res = make_router(svc)
            .oneshot(request(Method::DELETE, "/tables/Users/rows/2"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
