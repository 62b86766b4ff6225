use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::HeatmapError;
use crate::services::store::{MeasurementStore, PointFilter};

/// One aggregated (latitude, longitude, value) station measurement.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, utoipa::ToSchema)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(latitude: f64, longitude: f64, value: f64) -> Self {
        Self {
            latitude,
            longitude,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindDirection,
    Precipitation,
}

impl Parameter {
    pub const ALL: [Parameter; 6] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::WindSpeed,
        Self::WindDirection,
        Self::Precipitation,
    ];

    pub fn parse(raw: &str) -> Result<Self, HeatmapError> {
        Self::ALL
            .into_iter()
            .find(|param| param.as_str() == raw)
            .ok_or_else(|| HeatmapError::InvalidParameter(raw.to_string()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::WindSpeed => "wind_speed",
            Self::WindDirection => "wind_direction",
            Self::Precipitation => "precipitation",
        }
    }

    /// Column of `mediciones` holding this parameter.
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Temperature => "t",
            Self::Humidity => "h",
            Self::Pressure => "p",
            Self::WindSpeed => "ws",
            Self::WindDirection => "wd",
            Self::Precipitation => "p1h",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    #[default]
    Mean,
    Max,
    Min,
}

impl Aggregation {
    /// Unrecognised values fall back to `mean` rather than failing the request.
    pub fn lenient(raw: &str) -> Self {
        match raw {
            "max" => Self::Max,
            "min" => Self::Min,
            _ => Self::Mean,
        }
    }

    pub(crate) fn sql_function(self) -> &'static str {
        match self {
            Self::Mean => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    All,
    HoursBack(i64),
    /// Calendar range; `end` is inclusive of the whole day.
    Dates {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate, HeatmapError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        HeatmapError::InvalidTimeWindow(format!(
            "Invalid date '{raw}'; expected YYYY-MM-DD"
        ))
    })
}

impl TimeWindow {
    /// `hours_back` wins when present; otherwise the optional date range applies.
    pub fn from_query(
        hours_back: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, HeatmapError> {
        if let Some(raw) = non_empty(hours_back) {
            let hours = raw.parse::<i64>().map_err(|_| {
                HeatmapError::InvalidTimeWindow(format!("Invalid hours_back '{raw}'"))
            })?;
            return Ok(Self::HoursBack(hours));
        }

        let start = non_empty(start_date).map(parse_date).transpose()?;
        let end = non_empty(end_date).map(parse_date).transpose()?;
        if start.is_none() && end.is_none() {
            return Ok(Self::All);
        }
        Ok(Self::Dates { start, end })
    }

    pub fn bounds(&self, now: DateTime<Utc>) -> Result<TimeBounds, HeatmapError> {
        match *self {
            Self::All => Ok(TimeBounds::default()),
            Self::HoursBack(hours) => {
                let since = Duration::try_hours(hours)
                    .and_then(|span| now.checked_sub_signed(span))
                    .ok_or_else(|| {
                        HeatmapError::InvalidTimeWindow(format!(
                            "hours_back {hours} is out of range"
                        ))
                    })?;
                Ok(TimeBounds {
                    since: Some(since.naive_utc()),
                    until: None,
                })
            }
            Self::Dates { start, end } => {
                let until = match end {
                    Some(end) => Some(end.succ_opt().ok_or_else(|| {
                        HeatmapError::InvalidTimeWindow(format!("end_date {end} is out of range"))
                    })?),
                    None => None,
                };
                Ok(TimeBounds {
                    since: start.map(|d| d.and_time(NaiveTime::MIN)),
                    until: until.map(|d| d.and_time(NaiveTime::MIN)),
                })
            }
        }
    }
}

/// Half-open `[since, until)` filter on measurement timestamps (UTC, naive as stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBounds {
    pub since: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
}

impl TimeBounds {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.since.map_or(true, |since| ts >= since) && self.until.map_or(true, |until| ts < until)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointQuery {
    pub parameter: Parameter,
    pub aggregation: Aggregation,
    pub window: TimeWindow,
}

impl PointQuery {
    pub fn from_params(
        parameter: &str,
        aggregation: &str,
        hours_back: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, HeatmapError> {
        Ok(Self {
            parameter: Parameter::parse(parameter)?,
            aggregation: Aggregation::lenient(aggregation),
            window: TimeWindow::from_query(hours_back, start_date, end_date)?,
        })
    }
}

/// One sample per distinct station coordinate, aggregated over the window.
///
/// `excluded_stations` is applied to every query regardless of the other filters.
pub async fn fetch_points(
    store: &dyn MeasurementStore,
    query: &PointQuery,
    excluded_stations: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<Sample>, HeatmapError> {
    let filter = PointFilter {
        parameter: query.parameter,
        aggregation: query.aggregation,
        bounds: query.window.bounds(now)?,
        excluded_stations: excluded_stations.to_vec(),
    };
    let rows = store.location_aggregates(&filter).await.map_err(|err| {
        tracing::error!(
            error = %err,
            parameter = query.parameter.as_str(),
            "heatmap points query failed"
        );
        HeatmapError::Store(err)
    })?;
    Ok(rows.into_iter().filter_map(|row| row.into_sample()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryMeasurement, MemoryStore};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn at(hours_ago: i64) -> NaiveDateTime {
        (now() - Duration::hours(hours_ago)).naive_utc()
    }

    fn query(parameter: &str, agg: &str, hours_back: Option<&str>) -> PointQuery {
        PointQuery::from_params(parameter, agg, hours_back, None, None).unwrap()
    }

    #[test]
    fn parameters_map_to_measurement_columns() {
        let columns: Vec<&str> = Parameter::ALL.iter().map(|p| p.column()).collect();
        assert_eq!(columns, vec!["t", "h", "p", "ws", "wd", "p1h"]);
        assert_eq!(
            Parameter::parse("wind_speed").unwrap(),
            Parameter::WindSpeed
        );
        assert!(matches!(
            Parameter::parse("uv"),
            Err(HeatmapError::InvalidParameter(_))
        ));
        assert!(Parameter::parse("Temperature").is_err());
    }

    #[test]
    fn unknown_aggregation_falls_back_to_mean() {
        assert_eq!(Aggregation::lenient("max"), Aggregation::Max);
        assert_eq!(Aggregation::lenient("min"), Aggregation::Min);
        assert_eq!(Aggregation::lenient("median"), Aggregation::Mean);
        assert_eq!(Aggregation::lenient(""), Aggregation::Mean);
    }

    #[test]
    fn hours_back_takes_precedence_over_dates() {
        let window =
            TimeWindow::from_query(Some("24"), Some("2026-01-01"), Some("2026-01-02")).unwrap();
        assert_eq!(window, TimeWindow::HoursBack(24));
        let bounds = window.bounds(now()).unwrap();
        assert_eq!(bounds.since, Some(at(24)));
        assert_eq!(bounds.until, None);
    }

    #[test]
    fn blank_hours_back_is_ignored() {
        let window = TimeWindow::from_query(Some(""), None, None).unwrap();
        assert_eq!(window, TimeWindow::All);
        assert_eq!(window.bounds(now()).unwrap(), TimeBounds::default());
    }

    #[test]
    fn malformed_windows_are_rejected() {
        for (hours, start, end) in [
            (Some("1.5"), None, None),
            (Some("abc"), None, None),
            (None, Some("2026/01/01"), None),
            (None, None, Some("2026-13-01")),
        ] {
            assert!(matches!(
                TimeWindow::from_query(hours, start, end),
                Err(HeatmapError::InvalidTimeWindow(_))
            ));
        }
        let huge = TimeWindow::HoursBack(i64::MAX);
        assert!(matches!(
            huge.bounds(now()),
            Err(HeatmapError::InvalidTimeWindow(_))
        ));
    }

    #[test]
    fn end_date_covers_the_whole_day() {
        let window = TimeWindow::from_query(None, Some("2026-03-01"), Some("2026-03-05")).unwrap();
        let bounds = window.bounds(now()).unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        assert_eq!(bounds.since, Some(start.and_time(NaiveTime::MIN)));
        assert_eq!(bounds.until, Some(next.and_time(NaiveTime::MIN)));

        let last_second = NaiveDate::from_ymd_opt(2026, 3, 5)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert!(bounds.contains(last_second));
        assert!(!bounds.contains(next.and_time(NaiveTime::MIN)));
    }

    #[tokio::test]
    async fn aggregates_per_station_and_drops_nulls() {
        let store = MemoryStore::new(vec![
            MemoryMeasurement::new("201", 6.20, -75.60, at(1), Parameter::Temperature, Some(20.0)),
            MemoryMeasurement::new("201", 6.20, -75.60, at(2), Parameter::Temperature, Some(22.0)),
            MemoryMeasurement::new("202", 6.30, -75.55, at(1), Parameter::Temperature, None),
            MemoryMeasurement::new("203", 6.25, -75.50, at(1), Parameter::Humidity, Some(80.0)),
        ]);

        let points = fetch_points(&store, &query("temperature", "mean", None), &[], now())
            .await
            .unwrap();
        assert_eq!(points, vec![Sample::new(6.20, -75.60, 21.0)]);

        let points = fetch_points(&store, &query("temperature", "max", None), &[], now())
            .await
            .unwrap();
        assert_eq!(points[0].value, 22.0);
    }

    #[tokio::test]
    async fn time_window_limits_measurements() {
        let store = MemoryStore::new(vec![
            MemoryMeasurement::new("201", 6.20, -75.60, at(1), Parameter::Pressure, Some(850.0)),
            MemoryMeasurement::new("201", 6.20, -75.60, at(48), Parameter::Pressure, Some(800.0)),
        ]);
        let points = fetch_points(&store, &query("pressure", "min", Some("24")), &[], now())
            .await
            .unwrap();
        assert_eq!(points, vec![Sample::new(6.20, -75.60, 850.0)]);
    }

    #[tokio::test]
    async fn denylisted_station_never_appears() {
        let excluded = vec!["OUTLIER".to_string()];
        let store = MemoryStore::new(vec![
            MemoryMeasurement::new("OUTLIER", 6.90, -75.10, at(1), Parameter::Temperature, Some(35.0)),
            MemoryMeasurement::new("201", 6.20, -75.60, at(1), Parameter::Humidity, Some(70.0)),
        ]);

        let points = fetch_points(&store, &query("temperature", "mean", None), &excluded, now())
            .await
            .unwrap();
        assert!(points.is_empty());
        let filter = store.last_filter().unwrap();
        assert_eq!(filter.excluded_stations, excluded);
    }

    #[tokio::test]
    async fn store_failures_surface_the_store_message() {
        let store = MemoryStore::failing("connection refused");
        let err = fetch_points(&store, &query("humidity", "mean", None), &[], now())
            .await
            .unwrap_err();
        match err {
            HeatmapError::Store(inner) => assert!(inner.to_string().contains("connection refused")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
