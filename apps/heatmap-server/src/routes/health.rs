use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::PgPool;

use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct IndexResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct DatabaseHealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stations_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = IndexResponse))
)]
pub(crate) async fn index_handler() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Weather station heatmap API".to_string(),
        status: "running".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "OK", body = HealthResponse))
)]
pub(crate) async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Database reachable", body = DatabaseHealthResponse),
        (status = 500, description = "Database unreachable", body = DatabaseHealthResponse)
    )
)]
pub(crate) async fn database_health(State(db): State<PgPool>) -> Response {
    let count: Result<i64, sqlx::Error> = sqlx::query_scalar("SELECT COUNT(*) FROM estaciones")
        .fetch_one(&db)
        .await;
    match count {
        Ok(count) => Json(DatabaseHealthResponse {
            status: "ok".to_string(),
            stations_count: Some(count),
            message: None,
        })
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "database health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DatabaseHealthResponse {
                    status: "error".to_string(),
                    stations_count: None,
                    message: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Routes served outside `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
}

pub fn api_router() -> Router<AppState> {
    Router::new().route("/health", get(database_health))
}
