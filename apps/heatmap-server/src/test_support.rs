use crate::config::{HeatmapConfig, DEFAULT_GRID_SIZE, DEFAULT_MAX_GRID_SIZE};
use crate::db;
use crate::services::interpolation::{Capabilities, SurfaceEstimator};
use crate::services::points::{Aggregation, Parameter, Sample};
use crate::services::store::{LocationAggregate, MeasurementStore, PointFilter, StoreError};
use crate::state::AppState;
use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};

pub fn test_config() -> HeatmapConfig {
    HeatmapConfig {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        db_max_connections: 2,
        excluded_station_codes: Vec::new(),
        enable_scattered: true,
        default_grid_size: DEFAULT_GRID_SIZE,
        max_grid_size: DEFAULT_MAX_GRID_SIZE,
    }
}

/// One raw `mediciones` row joined with its station coordinates.
#[derive(Debug, Clone)]
pub struct MemoryMeasurement {
    pub station_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub measured_at: NaiveDateTime,
    pub parameter: Parameter,
    pub value: Option<f64>,
}

impl MemoryMeasurement {
    pub fn new(
        station_code: &str,
        latitude: f64,
        longitude: f64,
        measured_at: NaiveDateTime,
        parameter: Parameter,
        value: Option<f64>,
    ) -> Self {
        Self {
            station_code: station_code.to_string(),
            latitude,
            longitude,
            measured_at,
            parameter,
            value,
        }
    }
}

/// In-memory stand-in for the measurement tables, grouping like the SQL query does.
#[derive(Default)]
pub struct MemoryStore {
    rows: Vec<MemoryMeasurement>,
    failure: Option<String>,
    last_filter: Mutex<Option<PointFilter>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<MemoryMeasurement>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn last_filter(&self) -> Option<PointFilter> {
        self.last_filter.lock().unwrap().clone()
    }

    fn aggregate(&self, filter: &PointFilter) -> Vec<LocationAggregate> {
        let mut groups: Vec<((f64, f64), Vec<f64>)> = Vec::new();
        for row in &self.rows {
            if row.parameter != filter.parameter
                || !filter.bounds.contains(row.measured_at)
                || filter.excluded_stations.contains(&row.station_code)
            {
                continue;
            }
            let Some(value) = row.value else { continue };
            let key = (row.latitude, row.longitude);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => groups.push((key, vec![value])),
            }
        }

        groups
            .into_iter()
            .map(|((latitude, longitude), values)| {
                let value = match filter.aggregation {
                    Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
                    Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                };
                LocationAggregate {
                    latitude,
                    longitude,
                    value: Some(value),
                }
            })
            .collect()
    }
}

impl MeasurementStore for MemoryStore {
    fn location_aggregates<'a>(
        &'a self,
        filter: &'a PointFilter,
    ) -> BoxFuture<'a, Result<Vec<LocationAggregate>, StoreError>> {
        Box::pin(async move {
            *self.last_filter.lock().unwrap() = Some(filter.clone());
            if let Some(message) = &self.failure {
                return Err(StoreError(message.clone()));
            }
            Ok(self.aggregate(filter))
        })
    }
}

pub fn test_state(store: MemoryStore, capabilities: Capabilities) -> AppState {
    test_state_with_config(test_config(), store, capabilities)
}

pub fn test_state_with_config(
    config: HeatmapConfig,
    store: MemoryStore,
    capabilities: Capabilities,
) -> AppState {
    let pool = db::connect_lazy(&config.database_url, config.db_max_connections)
        .expect("connect_lazy");
    AppState {
        config,
        db: pool,
        store: Arc::new(store),
        estimator: SurfaceEstimator::new(capabilities),
    }
}

/// Deterministic pseudo-random station layouts around Medellín.
pub struct StationLayouts {
    state: u64,
}

impl StationLayouts {
    pub fn seeded(seed: u64) -> Self {
        Self { state: seed }
    }

    fn unit(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.state >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Between `min` and `max` stations inside lat 6.0..6.35, lon -75.7..-75.45.
    pub fn next_layout(&mut self, min: usize, max: usize) -> Vec<Sample> {
        let count = min + (self.unit() * (max - min + 1) as f64) as usize;
        (0..count)
            .map(|_| {
                let lat = 6.0 + 0.35 * self.unit();
                let lon = -75.7 + 0.25 * self.unit();
                Sample::new(lat, lon, 10.0 + 20.0 * self.unit())
            })
            .collect()
    }
}

/// Convex hull of sample locations (monotone chain), counter-clockwise in (lat, lon).
pub struct SampleHull {
    corners: Vec<(f64, f64)>,
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

impl SampleHull {
    pub fn of(samples: &[Sample]) -> Self {
        let mut points: Vec<(f64, f64)> = samples.iter().map(|s| (s.latitude, s.longitude)).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        points.dedup();

        let mut lower: Vec<(f64, f64)> = Vec::new();
        for &p in &points {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(p);
        }
        let mut upper: Vec<(f64, f64)> = Vec::new();
        for &p in points.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { corners: lower }
    }

    fn edges(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        let n = self.corners.len();
        (0..n).map(move |i| (self.corners[i], self.corners[(i + 1) % n]))
    }

    /// True when `(lat, lon)` is at least `margin` inside every hull edge.
    pub fn contains(&self, lat: f64, lon: f64, margin: f64) -> bool {
        self.corners.len() >= 3
            && self.edges().all(|(a, b)| {
                let length = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
                cross(a, b, (lat, lon)) / length >= margin
            })
    }

    pub fn area(&self) -> f64 {
        self.edges().map(|(a, b)| a.0 * b.1 - b.0 * a.1).sum::<f64>() / 2.0
    }
}
