//! Surface estimation: turns a sparse set of station samples into a dense grid.
//!
//! A request walks `fetch -> estimate -> subsample`. Estimation stops early with an
//! [`EstimateWarning`] when the data cannot support the requested method; callers render
//! the raw samples instead of a heatmap in that case.

pub mod grid;
pub mod polynomial;
pub mod stats;
#[cfg(feature = "scattered")]
pub mod triangulation;

use crate::error::HeatmapError;
use crate::services::points::Sample;

pub use grid::SurfaceGrid;
pub use stats::SummaryStats;

use grid::{linspace, BoundingBox};
use polynomial::{PolynomialDegree, PolynomialSurface};

/// Minimum sample count for any interpolation method.
pub const MIN_SAMPLES: usize = 4;
/// Upper bound on grid cells emitted per response.
pub const MAX_EMITTED_CELLS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Grid,
    Poly2,
    Poly3,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Poly2 => "poly2",
            Self::Poly3 => "poly3",
        }
    }

    /// Missing or blank selects `grid`; anything else must name a known method.
    pub fn from_query(raw: Option<&str>) -> Result<Self, HeatmapError> {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::default());
        };
        match raw.to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "poly2" => Ok(Self::Poly2),
            "poly3" => Ok(Self::Poly3),
            _ => Err(HeatmapError::InvalidMethod(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateWarning {
    #[error("Insufficient data for interpolation")]
    InsufficientData,
    #[error("Unstable polynomial fit: {0}")]
    UnstableFit(String),
}

/// Optional backends resolved once at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub scattered: bool,
}

impl Capabilities {
    pub fn detect(enable_scattered: bool) -> Self {
        Self {
            scattered: cfg!(feature = "scattered") && enable_scattered,
        }
    }
}

pub(crate) trait SurfaceStrategy: Send + Sync {
    fn method(&self) -> Method;

    /// Row-major cell estimates for `lat_axis × lon_axis`.
    fn evaluate(
        &self,
        samples: &[Sample],
        lat_axis: &[f64],
        lon_axis: &[f64],
    ) -> Result<Vec<Option<f64>>, EstimateWarning>;
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceEstimator {
    capabilities: Capabilities,
}

impl SurfaceEstimator {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    pub(crate) fn strategy(
        &self,
        method: Method,
    ) -> Result<Box<dyn SurfaceStrategy>, HeatmapError> {
        match method {
            Method::Grid => self.scattered_strategy(),
            Method::Poly2 => Ok(Box::new(PolynomialSurface {
                degree: PolynomialDegree::Quadratic,
            })),
            Method::Poly3 => Ok(Box::new(PolynomialSurface {
                degree: PolynomialDegree::Cubic,
            })),
        }
    }

    #[cfg(feature = "scattered")]
    fn scattered_strategy(&self) -> Result<Box<dyn SurfaceStrategy>, HeatmapError> {
        if !self.capabilities.scattered {
            return Err(HeatmapError::CapabilityUnavailable);
        }
        Ok(Box::new(triangulation::ScatteredLinear))
    }

    #[cfg(not(feature = "scattered"))]
    fn scattered_strategy(&self) -> Result<Box<dyn SurfaceStrategy>, HeatmapError> {
        Err(HeatmapError::CapabilityUnavailable)
    }

    /// Validates the method against the available backends, then estimates.
    pub fn estimate(
        &self,
        samples: &[Sample],
        grid_size: usize,
        method: Method,
    ) -> Result<Result<SurfaceGrid, EstimateWarning>, HeatmapError> {
        let strategy = self.strategy(method)?;
        Ok(estimate_with(samples, grid_size, strategy.as_ref()))
    }
}

pub(crate) fn estimate_with(
    samples: &[Sample],
    grid_size: usize,
    strategy: &dyn SurfaceStrategy,
) -> Result<SurfaceGrid, EstimateWarning> {
    if samples.len() < MIN_SAMPLES {
        return Err(EstimateWarning::InsufficientData);
    }
    let Some(bbox) = BoundingBox::of(samples) else {
        return Err(EstimateWarning::InsufficientData);
    };
    let grid_size = grid_size.max(1);
    let lat_axis = linspace(bbox.min_lat, bbox.max_lat, grid_size);
    let lon_axis = linspace(bbox.min_lon, bbox.max_lon, grid_size);
    let cells = strategy.evaluate(samples, &lat_axis, &lon_axis)?;
    tracing::debug!(
        method = strategy.method().as_str(),
        samples = samples.len(),
        grid_size,
        "surface estimated"
    );
    Ok(SurfaceGrid::new(lat_axis, lon_axis, cells))
}
