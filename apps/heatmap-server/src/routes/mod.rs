pub mod forecasts;
pub mod health;
pub mod heatmap;
pub mod stations;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(health::api_router())
                .merge(heatmap::router())
                .merge(stations::router())
                .merge(forecasts::router())
                .merge(crate::openapi::router()),
        )
        .with_state(state)
}
