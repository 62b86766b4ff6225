use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::error::HeatmapError;
use crate::services::interpolation::{
    stats, EstimateWarning, Method, SummaryStats, MAX_EMITTED_CELLS,
};
use crate::services::points::{fetch_points, PointQuery, Sample};
use crate::state::AppState;

const DEFAULT_PARAMETER: &str = "temperature";
const DEFAULT_AGGREGATION: &str = "mean";

#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct HeatmapQuery {
    /// temperature, humidity, pressure, wind_speed, wind_direction or precipitation.
    parameter: Option<String>,
    /// mean, max or min; anything else aggregates with mean.
    agg: Option<String>,
    /// Hours before now; wins over the date range when present.
    hours_back: Option<String>,
    /// YYYY-MM-DD
    start_date: Option<String>,
    /// YYYY-MM-DD, inclusive.
    end_date: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct InterpolateQuery {
    parameter: Option<String>,
    agg: Option<String>,
    hours_back: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    /// Cells per axis.
    grid_size: Option<String>,
    /// grid, poly2 or poly3.
    method: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct HeatmapResponse {
    success: bool,
    parameter: String,
    aggregation: String,
    points: Vec<Sample>,
    count: usize,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct InterpolateResponse {
    success: bool,
    parameter: String,
    aggregation: String,
    points_used: usize,
    grid_size: usize,
    interpolated_points: Vec<Sample>,
    count: usize,
    interp_method: Method,
    stats: Option<SummaryStats>,
}

/// Returned with 200 when the samples cannot support the requested surface.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct DegradedResponse {
    success: bool,
    warning: String,
    points: Vec<Sample>,
}

struct RequestedPoints {
    parameter: String,
    aggregation: String,
    query: PointQuery,
}

impl RequestedPoints {
    fn parse(
        parameter: Option<&str>,
        agg: Option<&str>,
        hours_back: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, HeatmapError> {
        let parameter = parameter.unwrap_or(DEFAULT_PARAMETER).to_string();
        let aggregation = agg.unwrap_or(DEFAULT_AGGREGATION).to_string();
        let query =
            PointQuery::from_params(&parameter, &aggregation, hours_back, start_date, end_date)?;
        Ok(Self {
            parameter,
            aggregation,
            query,
        })
    }
}

fn parse_grid_size(raw: Option<&str>, default: usize, max: usize) -> Result<usize, HeatmapError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    raw.parse::<usize>()
        .ok()
        .filter(|size| (1..=max).contains(size))
        .ok_or_else(|| HeatmapError::InvalidGridSize(raw.to_string(), max))
}

#[utoipa::path(
    get,
    path = "/api/heatmap",
    tag = "heatmap",
    params(HeatmapQuery),
    responses(
        (status = 200, description = "Aggregated station points", body = HeatmapResponse),
        (status = 400, description = "Invalid parameter or time window"),
        (status = 500, description = "Measurement store failure")
    )
)]
pub(crate) async fn heatmap_points(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<HeatmapResponse>, HeatmapError> {
    let requested = RequestedPoints::parse(
        query.parameter.as_deref(),
        query.agg.as_deref(),
        query.hours_back.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let points = fetch_points(
        state.store.as_ref(),
        &requested.query,
        &state.config.excluded_station_codes,
        Utc::now(),
    )
    .await?;

    Ok(Json(HeatmapResponse {
        success: true,
        parameter: requested.parameter,
        aggregation: requested.aggregation,
        count: points.len(),
        points,
    }))
}

#[utoipa::path(
    get,
    path = "/api/heatmap/interpolate",
    tag = "heatmap",
    params(InterpolateQuery),
    responses(
        (status = 200, description = "Interpolated grid, or a warning with the raw points", body = InterpolateResponse),
        (status = 400, description = "Invalid parameter, time window, grid_size or method"),
        (status = 500, description = "Measurement store failure"),
        (status = 501, description = "Scattered interpolation unavailable")
    )
)]
pub(crate) async fn heatmap_interpolate(
    State(state): State<AppState>,
    Query(query): Query<InterpolateQuery>,
) -> Result<Response, HeatmapError> {
    let requested = RequestedPoints::parse(
        query.parameter.as_deref(),
        query.agg.as_deref(),
        query.hours_back.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let method = Method::from_query(query.method.as_deref())?;
    let grid_size = parse_grid_size(
        query.grid_size.as_deref(),
        state.config.default_grid_size,
        state.config.max_grid_size,
    )?;
    // Fail on a missing backend before touching the store.
    state.estimator.strategy(method)?;

    let points = fetch_points(
        state.store.as_ref(),
        &requested.query,
        &state.config.excluded_station_codes,
        Utc::now(),
    )
    .await?;

    let estimator = state.estimator;
    let samples = points.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        estimator.estimate(&samples, grid_size, method)
    })
    .await
    .map_err(|err| HeatmapError::Internal(format!("surface estimation task failed: {err}")))??;

    let grid = match outcome {
        Ok(grid) => grid,
        Err(warning) => return Ok(degraded(warning, points, method)),
    };

    let interpolated_points = grid.subsample(MAX_EMITTED_CELLS);
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    Ok(Json(InterpolateResponse {
        success: true,
        parameter: requested.parameter,
        aggregation: requested.aggregation,
        points_used: points.len(),
        grid_size,
        count: interpolated_points.len(),
        interpolated_points,
        interp_method: method,
        stats: stats::summarize(&values),
    })
    .into_response())
}

fn degraded(warning: EstimateWarning, points: Vec<Sample>, method: Method) -> Response {
    tracing::debug!(
        method = method.as_str(),
        points = points.len(),
        warning = %warning,
        "returning raw points instead of a surface"
    );
    Json(DegradedResponse {
        success: false,
        warning: warning.to_string(),
        points,
    })
    .into_response()
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/heatmap", get(heatmap_points))
        .route("/heatmap/interpolate", get(heatmap_interpolate))
}
