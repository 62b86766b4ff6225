use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::PgPool;

use crate::error::{map_db_error, AppResult};
use crate::state::AppState;

/// One day of a zone forecast. Rain fields hold the provider's free-text category.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub(crate) struct ForecastRead {
    zone: String,
    date: Option<NaiveDate>,
    max_temperature: Option<f64>,
    min_temperature: Option<f64>,
    rain_dawn: Option<String>,
    rain_morning: Option<String>,
    rain_afternoon: Option<String>,
    rain_night: Option<String>,
    updated_at: Option<NaiveDateTime>,
}

const FORECAST_COLUMNS: &str = r#"
    SELECT
        zona::text AS zone,
        fecha::date AS date,
        temperatura_maxima::double precision AS max_temperature,
        temperatura_minima::double precision AS min_temperature,
        lluvia_madrugada::text AS rain_dawn,
        lluvia_mannana::text AS rain_morning,
        lluvia_tarde::text AS rain_afternoon,
        lluvia_noche::text AS rain_night,
        date_update::timestamp AS updated_at
    FROM pronosticos
"#;

fn all_forecasts_sql() -> String {
    format!("{FORECAST_COLUMNS} ORDER BY zona, fecha")
}

fn zone_forecasts_sql() -> String {
    format!("{FORECAST_COLUMNS} WHERE zona = $1 ORDER BY fecha")
}

#[utoipa::path(
    get,
    path = "/api/forecasts",
    tag = "forecasts",
    responses(
        (status = 200, description = "All forecasts ordered by zone and date", body = Vec<ForecastRead>),
        (status = 500, description = "Database error")
    )
)]
pub(crate) async fn list_forecasts(
    State(db): State<PgPool>,
) -> AppResult<Json<Vec<ForecastRead>>> {
    let rows: Vec<ForecastRead> = sqlx::query_as(&all_forecasts_sql())
        .fetch_all(&db)
        .await
        .map_err(map_db_error)?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/api/forecasts/{zone}",
    tag = "forecasts",
    params(("zone" = String, Path, description = "Forecast zone name")),
    responses(
        (status = 200, description = "Forecasts for one zone ordered by date", body = Vec<ForecastRead>),
        (status = 500, description = "Database error")
    )
)]
pub(crate) async fn zone_forecasts(
    State(db): State<PgPool>,
    Path(zone): Path<String>,
) -> AppResult<Json<Vec<ForecastRead>>> {
    let rows: Vec<ForecastRead> = sqlx::query_as(&zone_forecasts_sql())
        .bind(zone.trim())
        .fetch_all(&db)
        .await
        .map_err(map_db_error)?;
    Ok(Json(rows))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forecasts", get(list_forecasts))
        .route("/forecasts/{zone}", get(zone_forecasts))
}
