use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{forecasts, health, heatmap, stations};
use crate::services::interpolation::{Method, SummaryStats};
use crate::services::points::Sample;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(title = "Weather station heatmap API"),
    paths(
        health::index_handler,
        health::healthz_handler,
        health::database_health,
        heatmap::heatmap_points,
        heatmap::heatmap_interpolate,
        stations::list_stations,
        forecasts::list_forecasts,
        forecasts::zone_forecasts,
    ),
    components(schemas(
        health::HealthResponse,
        health::IndexResponse,
        health::DatabaseHealthResponse,
        heatmap::HeatmapResponse,
        heatmap::InterpolateResponse,
        heatmap::DegradedResponse,
        stations::StationRead,
        forecasts::ForecastRead,
        Sample,
        SummaryStats,
        Method,
    )),
    tags(
        (name = "heatmap", description = "Station aggregates and interpolated surfaces"),
        (name = "stations", description = "Station catalogue"),
        (name = "forecasts", description = "Zone forecasts")
    )
)]
struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_default()
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}
