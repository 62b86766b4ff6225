use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::services::points::{Aggregation, Parameter, Sample, TimeBounds};

/// Filter handed to the measurement store for one heatmap request.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFilter {
    pub parameter: Parameter,
    pub aggregation: Aggregation,
    pub bounds: TimeBounds,
    pub excluded_stations: Vec<String>,
}

/// Aggregate for one station coordinate as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct LocationAggregate {
    pub latitude: f64,
    pub longitude: f64,
    pub value: Option<f64>,
}

impl LocationAggregate {
    pub fn into_sample(self) -> Option<Sample> {
        let value = self.value.filter(|v| v.is_finite())?;
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return None;
        }
        Some(Sample::new(self.latitude, self.longitude, value))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// Source of per-location aggregates for the heatmap.
pub trait MeasurementStore: Send + Sync {
    fn location_aggregates<'a>(
        &'a self,
        filter: &'a PointFilter,
    ) -> BoxFuture<'a, Result<Vec<LocationAggregate>, StoreError>>;
}

#[derive(Clone)]
pub struct PgMeasurementStore {
    pool: PgPool,
}

impl PgMeasurementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn location_aggregates_query(filter: &PointFilter) -> QueryBuilder<'static, Postgres> {
    let column = filter.parameter.column();
    let func = filter.aggregation.sql_function();

    let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
        r#"
        SELECT
            e.latitud::double precision AS latitude,
            e.longitud::double precision AS longitude,
            {func}(m.{column})::double precision AS value
        FROM mediciones m
        JOIN estaciones e ON e.codigo = m.estacion_codigo
        WHERE m.{column} IS NOT NULL
          AND NOT (e.codigo::text = ANY("#
    ));
    builder.push_bind(filter.excluded_stations.clone());
    builder.push("))");
    if let Some(since) = filter.bounds.since {
        builder.push(" AND m.fecha_medicion >= ");
        builder.push_bind(since);
    }
    if let Some(until) = filter.bounds.until {
        builder.push(" AND m.fecha_medicion < ");
        builder.push_bind(until);
    }
    builder.push(
        r#"
        GROUP BY e.latitud, e.longitud
        HAVING COUNT(*) > 0
        "#,
    );
    builder
}

impl MeasurementStore for PgMeasurementStore {
    fn location_aggregates<'a>(
        &'a self,
        filter: &'a PointFilter,
    ) -> BoxFuture<'a, Result<Vec<LocationAggregate>, StoreError>> {
        Box::pin(async move {
            let mut builder = location_aggregates_query(filter);
            let rows: Vec<LocationAggregate> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await?;
            tracing::debug!(
                parameter = filter.parameter.as_str(),
                rows = rows.len(),
                "loaded heatmap location aggregates"
            );
            Ok(rows)
        })
    }
}
