use nalgebra::{DMatrix, DVector};

use super::{EstimateWarning, Method, SurfaceStrategy};
use crate::services::points::Sample;

const MAX_TERMS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolynomialDegree {
    Quadratic,
    Cubic,
}

impl PolynomialDegree {
    pub fn terms(self) -> usize {
        match self {
            Self::Quadratic => 6,
            Self::Cubic => 10,
        }
    }

    /// Fewer samples than terms leaves the least-squares system underdetermined.
    /// Degree 3 is only really stable from ~12 samples, but that is not enforced.
    pub fn min_samples(self) -> usize {
        self.terms()
    }

    fn method(self) -> Method {
        match self {
            Self::Quadratic => Method::Poly2,
            Self::Cubic => Method::Poly3,
        }
    }
}

/// Centering and scaling applied to both coordinates before building the design matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub lat_mean: f64,
    pub lat_std: f64,
    pub lon_mean: f64,
    pub lon_std: f64,
}

impl Normalization {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let (lat_mean, lat_std) = mean_and_std(samples.iter().map(|s| s.latitude));
        let (lon_mean, lon_std) = mean_and_std(samples.iter().map(|s| s.longitude));
        Self {
            lat_mean,
            lat_std,
            lon_mean,
            lon_std,
        }
    }

    pub fn apply(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        (
            (latitude - self.lat_mean) / self.lat_std,
            (longitude - self.lon_mean) / self.lon_std,
        )
    }
}

/// Population mean and standard deviation; a zero spread is reported as 1.
fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (0.0, 1.0);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    if std == 0.0 || !std.is_finite() {
        (mean, 1.0)
    } else {
        (mean, std)
    }
}

/// Regressor row in column order `1, X, Y, X², XY, Y², X³, X²Y, XY², Y³`.
fn design_row(x: f64, y: f64) -> [f64; MAX_TERMS] {
    [
        1.0,
        x,
        y,
        x * x,
        x * y,
        y * y,
        x * x * x,
        x * x * y,
        x * y * y,
        y * y * y,
    ]
}

/// Least-squares 2-D polynomial surface, coefficients in design-row order.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialFit {
    degree: PolynomialDegree,
    coefficients: Vec<f64>,
    normalization: Normalization,
}

impl PolynomialFit {
    pub fn fit(samples: &[Sample], degree: PolynomialDegree) -> Result<Self, EstimateWarning> {
        let terms = degree.terms();
        if samples.len() < degree.min_samples() {
            return Err(EstimateWarning::UnstableFit(format!(
                "{} needs at least {} samples, got {}",
                degree.method().as_str(),
                degree.min_samples(),
                samples.len()
            )));
        }

        let normalization = Normalization::from_samples(samples);
        let rows: Vec<[f64; MAX_TERMS]> = samples
            .iter()
            .map(|s| {
                let (x, y) = normalization.apply(s.latitude, s.longitude);
                design_row(x, y)
            })
            .collect();
        let design = DMatrix::from_fn(rows.len(), terms, |r, c| rows[r][c]);
        let target = DVector::from_iterator(samples.len(), samples.iter().map(|s| s.value));

        let svd = design.svd(true, true);
        let max_singular = svd.singular_values.max();
        if !(max_singular > 0.0) || !max_singular.is_finite() {
            return Err(EstimateWarning::UnstableFit(
                "design matrix is empty or non-finite".to_string(),
            ));
        }
        let eps = f64::EPSILON * samples.len().max(terms) as f64 * max_singular;
        let rank = svd.rank(eps);
        if rank < terms {
            return Err(EstimateWarning::UnstableFit(format!(
                "design matrix is rank deficient ({rank} of {terms} columns)"
            )));
        }
        let solution = svd
            .solve(&target, eps)
            .map_err(|err| EstimateWarning::UnstableFit(err.to_string()))?;
        let coefficients: Vec<f64> = solution.iter().copied().collect();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EstimateWarning::UnstableFit(
                "solver produced non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            degree,
            coefficients,
            normalization,
        })
    }

    pub fn degree(&self) -> PolynomialDegree {
        self.degree
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }

    pub fn evaluate_normalized(&self, x: f64, y: f64) -> f64 {
        design_row(x, y)
            .iter()
            .zip(self.coefficients.iter())
            .map(|(term, coef)| term * coef)
            .sum()
    }

    pub fn evaluate(&self, latitude: f64, longitude: f64) -> f64 {
        let (x, y) = self.normalization.apply(latitude, longitude);
        self.evaluate_normalized(x, y)
    }
}

/// `method=poly2|poly3`: every cell is defined, no convex-hull restriction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PolynomialSurface {
    pub(crate) degree: PolynomialDegree,
}

impl SurfaceStrategy for PolynomialSurface {
    fn method(&self) -> Method {
        self.degree.method()
    }

    fn evaluate(
        &self,
        samples: &[Sample],
        lat_axis: &[f64],
        lon_axis: &[f64],
    ) -> Result<Vec<Option<f64>>, EstimateWarning> {
        let fit = PolynomialFit::fit(samples, self.degree)?;
        let mut cells = Vec::with_capacity(lat_axis.len() * lon_axis.len());
        for &lat in lat_axis {
            for &lon in lon_axis {
                let value = fit.evaluate(lat, lon);
                cells.push(value.is_finite().then_some(value));
            }
        }
        Ok(cells)
    }
}
