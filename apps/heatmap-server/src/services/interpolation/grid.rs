use crate::services::points::Sample;

/// Evenly spaced values from `start` to `end` inclusive.
///
/// A single-point axis holds only `start`; when `start == end` every entry repeats it.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|idx| {
                    if idx == n - 1 {
                        end
                    } else {
                        start + step * idx as f64
                    }
                })
                .collect()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn of(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let init = Self {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lon: first.longitude,
            max_lon: first.longitude,
        };
        Some(samples.iter().skip(1).fold(init, |bbox, sample| Self {
            min_lat: bbox.min_lat.min(sample.latitude),
            max_lat: bbox.max_lat.max(sample.latitude),
            min_lon: bbox.min_lon.min(sample.longitude),
            max_lon: bbox.max_lon.max(sample.longitude),
        }))
    }
}

/// Dense N×N estimate over the sample bounding box.
///
/// Cells are stored row-major: cell `(i, j)` sits at `(lat_axis[i], lon_axis[j])`.
/// `None` marks a cell the interpolation method could not produce a value for.
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    size: usize,
    lat_axis: Vec<f64>,
    lon_axis: Vec<f64>,
    cells: Vec<Option<f64>>,
}

impl SurfaceGrid {
    pub(crate) fn new(lat_axis: Vec<f64>, lon_axis: Vec<f64>, cells: Vec<Option<f64>>) -> Self {
        let size = lat_axis.len();
        debug_assert_eq!(lon_axis.len(), size);
        debug_assert_eq!(cells.len(), size * size);
        Self {
            size,
            lat_axis,
            lon_axis,
            cells,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn lat_axis(&self) -> &[f64] {
        &self.lat_axis
    }

    pub fn lon_axis(&self) -> &[f64] {
        &self.lon_axis
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells[row * self.size + col]
    }

    pub fn defined_cells(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Stride sample of the grid capped at `max_cells` emitted points.
    ///
    /// Rows and columns share one stride; undefined cells are skipped. This is a
    /// deterministic thinning, not a statistically representative subsample.
    pub fn subsample(&self, max_cells: usize) -> Vec<Sample> {
        let step = subsample_step(self.size, max_cells);
        let mut out = Vec::new();
        for row in (0..self.size).step_by(step) {
            for col in (0..self.size).step_by(step) {
                let Some(value) = self.value(row, col) else {
                    continue;
                };
                out.push(Sample {
                    latitude: self.lat_axis[row],
                    longitude: self.lon_axis[col],
                    value,
                });
            }
        }
        out
    }
}

/// `max(1, floor(N² / max_cells))`, widened until `ceil(N / step)²` fits the cap.
pub fn subsample_step(grid_size: usize, max_cells: usize) -> usize {
    let max_cells = max_cells.max(1);
    let mut step = (grid_size.saturating_mul(grid_size) / max_cells).max(1);
    while grid_size.div_ceil(step).saturating_pow(2) > max_cells {
        step += 1;
    }
    step
}
