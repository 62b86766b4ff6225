use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::store::StoreError;

/// Failures of the heatmap endpoints. Degraded estimates are not errors; see
/// [`crate::services::interpolation::EstimateWarning`].
#[derive(Debug, thiserror::Error)]
pub enum HeatmapError {
    #[error("Invalid parameter '{0}'")]
    InvalidParameter(String),
    #[error("{0}")]
    InvalidTimeWindow(String),
    #[error("Invalid grid_size '{0}'; expected an integer between 1 and {1}")]
    InvalidGridSize(String, usize),
    #[error("Invalid method '{0}'; expected grid, poly2 or poly3")]
    InvalidMethod(String),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("Scattered interpolation is not available on this server")]
    CapabilityUnavailable,
    #[error("{0}")]
    Internal(String),
}

impl HeatmapError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_)
            | Self::InvalidTimeWindow(_)
            | Self::InvalidGridSize(..)
            | Self::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CapabilityUnavailable => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl IntoResponse for HeatmapError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Error for the plain read endpoints (`/api/stations`, `/api/forecasts`).
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<(StatusCode, String)> for AppError {
    fn from((status, message): (StatusCode, String)) -> Self {
        Self::new(status, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub fn map_db_error(err: sqlx::Error) -> (StatusCode, String) {
    let status = match &err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("22P02") => StatusCode::BAD_REQUEST, // invalid_text_representation
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::error!(error = %err, status = %status, "database error");

    let message = match status {
        StatusCode::NOT_FOUND => "Resource not found",
        StatusCode::BAD_REQUEST => "Invalid request",
        _ => "Database error",
    };

    (status, message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        for err in [
            HeatmapError::InvalidParameter("uv".into()),
            HeatmapError::InvalidTimeWindow("bad".into()),
            HeatmapError::InvalidGridSize("0".into(), 400),
            HeatmapError::InvalidMethod("kriging".into()),
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(
            HeatmapError::CapabilityUnavailable.status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[tokio::test]
    async fn store_message_is_surfaced_in_body() {
        let err = HeatmapError::from(StoreError("relation \"mediciones\" does not exist".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "relation \"mediciones\" does not exist");
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let response = HeatmapError::Internal("worker panicked".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let (status, message) = map_db_error(sqlx::Error::RowNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Resource not found");
    }
}
