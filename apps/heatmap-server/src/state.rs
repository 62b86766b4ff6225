use crate::config::HeatmapConfig;
use crate::services::interpolation::SurfaceEstimator;
use crate::services::store::MeasurementStore;
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: HeatmapConfig,
    pub db: PgPool,
    pub store: Arc<dyn MeasurementStore>,
    pub estimator: SurfaceEstimator,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.db.clone()
    }
}

impl FromRef<AppState> for Arc<dyn MeasurementStore> {
    fn from_ref(state: &AppState) -> Arc<dyn MeasurementStore> {
        state.store.clone()
    }
}
