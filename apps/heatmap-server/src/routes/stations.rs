use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::PgPool;

use crate::error::{map_db_error, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub(crate) struct StationRead {
    code: String,
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    commune: Option<String>,
    subbasin: Option<String>,
    neighborhood: Option<String>,
    active: bool,
}

const ACTIVE_STATIONS_SQL: &str = r#"
    SELECT
        codigo::text AS code,
        nombre AS name,
        latitud::double precision AS latitude,
        longitud::double precision AS longitude,
        ciudad AS city,
        comuna AS commune,
        subcuenca AS subbasin,
        barrio AS neighborhood,
        COALESCE(activa, false) AS active
    FROM estaciones
    WHERE activa = true
    ORDER BY nombre
"#;

#[utoipa::path(
    get,
    path = "/api/stations",
    tag = "stations",
    responses(
        (status = 200, description = "Active stations ordered by name", body = Vec<StationRead>),
        (status = 500, description = "Database error")
    )
)]
pub(crate) async fn list_stations(State(db): State<PgPool>) -> AppResult<Json<Vec<StationRead>>> {
    let rows: Vec<StationRead> = sqlx::query_as(ACTIVE_STATIONS_SQL)
        .fetch_all(&db)
        .await
        .map_err(map_db_error)?;
    Ok(Json(rows))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stations", get(list_stations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_serializes_with_english_field_names() {
        let station = StationRead {
            code: "201".to_string(),
            name: Some("Torre SIATA".to_string()),
            latitude: Some(6.259),
            longitude: Some(-75.588),
            city: Some("Medellin".to_string()),
            commune: None,
            subbasin: None,
            neighborhood: Some("Aranjuez".to_string()),
            active: true,
        };
        let body = serde_json::to_value(station).unwrap();
        assert_eq!(body["code"], "201");
        assert_eq!(body["latitude"], 6.259);
        assert_eq!(body["commune"], serde_json::Value::Null);
        assert_eq!(body["active"], true);
    }

    #[test]
    fn only_active_stations_are_listed() {
        assert!(ACTIVE_STATIONS_SQL.contains("WHERE activa = true"));
        assert!(ACTIVE_STATIONS_SQL.contains("ORDER BY nombre"));
    }
}
