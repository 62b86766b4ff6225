/// Legend scaling summary over the raw sample values of one request.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, utoipa::ToSchema)]
pub struct SummaryStats {
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub q90: f64,
    pub max: f64,
}

/// Quantile of an ascending slice using linear interpolation between order statistics.
pub fn quantile_linear(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn summarize(values: &[f64]) -> Option<SummaryStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(SummaryStats {
        min: sorted[0],
        q25: quantile_linear(&sorted, 0.25)?,
        q50: quantile_linear(&sorted, 0.50)?,
        q75: quantile_linear(&sorted, 0.75)?,
        q90: quantile_linear(&sorted, 0.90)?,
        max: sorted[sorted.len() - 1],
    })
}
