//! Trend analysis and risk prediction
//!
//! Series are one value per analysis run, oldest first. Slopes are per run.
//! The burnout score is tracked on a 0-10 scale (composite / 10).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::RiskLevel;

/// Slope beyond which a series is increasing or decreasing
pub const DIRECTION_THRESHOLD: f64 = 0.1;

/// Half-slope difference beyond which a trend is accelerating
pub const ACCELERATION_THRESHOLD: f64 = 0.2;

/// Points needed before acceleration is computed
pub const MIN_POINTS_FOR_ACCELERATION: usize = 4;

/// Trends with at least this many points count toward confidence
pub const CONFIDENT_DATA_POINTS: usize = 5;

/// The predictor never claims more confidence than this
pub const MAX_CONFIDENCE: f64 = 0.8;

/// Volatility above which a metric is considered unstable
pub const VOLATILITY_THRESHOLD: f64 = 0.3;

/// Smallest slope considered for critical timelines
pub const MIN_TIMELINE_SLOPE: f64 = 0.01;

const VELOCITY_SCALE: f64 = 10.0;
const ACCELERATION_SCALE: f64 = 5.0;
const PROJECTION_PERIOD_DAYS: f64 = 30.0;

/// Metrics tracked across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedMetric {
    BurnoutScore,
    IncidentLoad,
    AfterHoursPercentage,
    WeekendWork,
    ResponseTime,
    Sentiment,
}

impl TrackedMetric {
    pub const ALL: [TrackedMetric; 6] = [
        TrackedMetric::BurnoutScore,
        TrackedMetric::IncidentLoad,
        TrackedMetric::AfterHoursPercentage,
        TrackedMetric::WeekendWork,
        TrackedMetric::ResponseTime,
        TrackedMetric::Sentiment,
    ];

    /// Weight in the composite risk velocity
    pub fn velocity_weight(self) -> f64 {
        match self {
            TrackedMetric::BurnoutScore => 0.30,
            TrackedMetric::IncidentLoad => 0.20,
            TrackedMetric::AfterHoursPercentage => 0.20,
            TrackedMetric::Sentiment => 0.15,
            TrackedMetric::ResponseTime => 0.15,
            TrackedMetric::WeekendWork => 0.0,
        }
    }

    /// Lower values are worse
    pub fn is_inverse(self) -> bool {
        matches!(self, TrackedMetric::Sentiment)
    }

    /// Value at which the metric is considered critical
    pub fn critical_threshold(self) -> f64 {
        match self {
            TrackedMetric::BurnoutScore => 8.0,
            TrackedMetric::IncidentLoad => 25.0,
            TrackedMetric::AfterHoursPercentage => 40.0,
            TrackedMetric::WeekendWork => 25.0,
            TrackedMetric::ResponseTime => 240.0,
            TrackedMetric::Sentiment => -0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedMetric::BurnoutScore => "burnout_score",
            TrackedMetric::IncidentLoad => "incident_load",
            TrackedMetric::AfterHoursPercentage => "after_hours_percentage",
            TrackedMetric::WeekendWork => "weekend_work",
            TrackedMetric::ResponseTime => "response_time",
            TrackedMetric::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for TrackedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest observed value of each tracked metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentMetrics {
    /// 0-10
    pub burnout_score: Option<f64>,
    /// Severity-weighted incidents per week
    pub incident_load: Option<f64>,
    pub after_hours_percentage: Option<f64>,
    pub weekend_work: Option<f64>,
    /// Minutes to acknowledge
    pub response_time: Option<f64>,
    /// -1 to 1
    pub sentiment: Option<f64>,
}

impl CurrentMetrics {
    pub fn get(&self, metric: TrackedMetric) -> Option<f64> {
        match metric {
            TrackedMetric::BurnoutScore => self.burnout_score,
            TrackedMetric::IncidentLoad => self.incident_load,
            TrackedMetric::AfterHoursPercentage => self.after_hours_percentage,
            TrackedMetric::WeekendWork => self.weekend_work,
            TrackedMetric::ResponseTime => self.response_time,
            TrackedMetric::Sentiment => self.sentiment,
        }
    }

    /// Present values in metric order
    pub fn iter(&self) -> impl Iterator<Item = (TrackedMetric, f64)> + '_ {
        TrackedMetric::ALL
            .into_iter()
            .filter_map(move |metric| self.get(metric).map(|value| (metric, value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    InsufficientData,
    Stable,
    Increasing,
    Decreasing,
    AcceleratingIncrease,
    AcceleratingDecrease,
}

impl TrendDirection {
    pub fn is_increasing(self) -> bool {
        matches!(self, TrendDirection::Increasing | TrendDirection::AcceleratingIncrease)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::InsufficientData => "insufficient_data",
            TrendDirection::Stable => "stable",
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::AcceleratingIncrease => "accelerating_increase",
            TrendDirection::AcceleratingDecrease => "accelerating_decrease",
        }
    }
}

/// Trend of one metric series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// Least-squares slope per run, negated for inverse metrics
    pub slope: f64,
    /// Second-half slope minus first-half slope, negated for inverse metrics
    pub acceleration: f64,
    /// Sample standard deviation over absolute mean
    pub volatility: f64,
    pub current_value: f64,
    pub mean_value: f64,
    /// Finite points in the series; still reported when the other fields are
    /// zeroed for insufficient data
    pub data_points: usize,
}

impl TrendResult {
    fn insufficient(data_points: usize) -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
            acceleration: 0.0,
            volatility: 0.0,
            current_value: 0.0,
            mean_value: 0.0,
            data_points,
        }
    }

    pub fn has_data(&self) -> bool {
        self.direction != TrendDirection::InsufficientData
    }
}

/// Trends keyed by metric
pub type TrendMap = BTreeMap<TrackedMetric, TrendResult>;

/// Fit a linear trend to a series (oldest first).
///
/// Non-finite values are dropped. Fewer than two points yields
/// `insufficient_data` with zeroed fields.
pub fn trend(series: &[f64], inverse: bool) -> TrendResult {
    let values: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let n = values.len();
    if n < 2 {
        return TrendResult::insufficient(n);
    }

    let mean_value = values.iter().sum::<f64>() / n as f64;
    let mut slope = least_squares_slope(&values, mean_value);

    let mut acceleration = if n >= MIN_POINTS_FOR_ACCELERATION {
        let (first, second) = values.split_at(n / 2);
        endpoint_slope(second) - endpoint_slope(first)
    } else {
        0.0
    };

    if inverse {
        slope = -slope;
        acceleration = -acceleration;
    }

    let mut direction = if slope > DIRECTION_THRESHOLD {
        TrendDirection::Increasing
    } else if slope < -DIRECTION_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    if acceleration > ACCELERATION_THRESHOLD && slope > 0.0 {
        direction = TrendDirection::AcceleratingIncrease;
    } else if acceleration < -ACCELERATION_THRESHOLD && slope < 0.0 {
        direction = TrendDirection::AcceleratingDecrease;
    }

    let volatility = if mean_value == 0.0 {
        0.0
    } else {
        let variance =
            values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt() / mean_value.abs()
    };

    TrendResult {
        direction,
        slope,
        acceleration,
        volatility,
        current_value: values[n - 1],
        mean_value,
        data_points: n,
    }
}

fn least_squares_slope(values: &[f64], mean_y: f64) -> f64 {
    let mean_x = (values.len() - 1) as f64 / 2.0;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn endpoint_slope(values: &[f64]) -> f64 {
    match values {
        [first, .., last] => (last - first) / (values.len() - 1) as f64,
        _ => 0.0,
    }
}

/// Trend every series, applying each metric's inverse flag
pub fn analyze_trends(history: &BTreeMap<TrackedMetric, Vec<f64>>) -> TrendMap {
    history
        .iter()
        .map(|(metric, series)| (*metric, trend(series, metric.is_inverse())))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyWarningKind {
    BurnoutAcceleration,
    AfterHoursEscalation,
    HighVolatility,
    CompoundRiskFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyWarning {
    pub kind: EarlyWarningKind,
    pub severity: RiskLevel,
    /// Metrics that triggered the warning
    pub metrics: Vec<TrackedMetric>,
    /// Slope, percentage or count behind the warning
    pub value: f64,
}

/// Slope of the burnout score that triggers a warning
const BURNOUT_SLOPE_WARNING: f64 = 0.5;
/// After-hours share that triggers a warning when rising
const AFTER_HOURS_WARNING_PERCENTAGE: f64 = 30.0;
const MIN_VOLATILE_METRICS: usize = 2;
const MIN_COMPOUND_METRICS: usize = 3;

/// Early-warning conditions over the trend map and current metrics
pub fn early_warnings(trends: &TrendMap, current: &CurrentMetrics) -> Vec<EarlyWarning> {
    let mut warnings = Vec::new();

    if let Some(burnout) = trends.get(&TrackedMetric::BurnoutScore) {
        if burnout.direction == TrendDirection::AcceleratingIncrease
            || burnout.slope > BURNOUT_SLOPE_WARNING
        {
            warnings.push(EarlyWarning {
                kind: EarlyWarningKind::BurnoutAcceleration,
                severity: RiskLevel::High,
                metrics: vec![TrackedMetric::BurnoutScore],
                value: burnout.slope,
            });
        }
    }

    if let (Some(after_hours), Some(value)) = (
        trends.get(&TrackedMetric::AfterHoursPercentage),
        current.after_hours_percentage,
    ) {
        if value > AFTER_HOURS_WARNING_PERCENTAGE && after_hours.direction.is_increasing() {
            warnings.push(EarlyWarning {
                kind: EarlyWarningKind::AfterHoursEscalation,
                severity: RiskLevel::Medium,
                metrics: vec![TrackedMetric::AfterHoursPercentage],
                value,
            });
        }
    }

    let volatile: Vec<TrackedMetric> = trends
        .iter()
        .filter(|(_, t)| t.volatility > VOLATILITY_THRESHOLD)
        .map(|(m, _)| *m)
        .collect();
    if volatile.len() >= MIN_VOLATILE_METRICS {
        warnings.push(EarlyWarning {
            kind: EarlyWarningKind::HighVolatility,
            severity: RiskLevel::Medium,
            value: volatile.len() as f64,
            metrics: volatile,
        });
    }

    let rising: Vec<TrackedMetric> = trends
        .iter()
        .filter(|(m, t)| !m.is_inverse() && t.direction.is_increasing())
        .map(|(m, _)| *m)
        .collect();
    if rising.len() >= MIN_COMPOUND_METRICS {
        warnings.push(EarlyWarning {
            kind: EarlyWarningKind::CompoundRiskFactors,
            severity: RiskLevel::High,
            value: rising.len() as f64,
            metrics: rising,
        });
    }

    warnings
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTrajectory {
    InsufficientData,
    Improving,
    Stable,
    SlowlyDeteriorating,
    Deteriorating,
    RapidlyDeteriorating,
}

impl RiskTrajectory {
    /// Classify composite velocity and acceleration.
    ///
    /// Velocities between -5 and -2 fall through to slowly deteriorating.
    pub fn classify(velocity: f64, acceleration: f64) -> Self {
        if acceleration > 0.5 {
            RiskTrajectory::RapidlyDeteriorating
        } else if velocity > 5.0 {
            RiskTrajectory::Deteriorating
        } else if velocity < -5.0 {
            RiskTrajectory::Improving
        } else if velocity.abs() < 2.0 {
            RiskTrajectory::Stable
        } else {
            RiskTrajectory::SlowlyDeteriorating
        }
    }
}

/// Weighted contribution of one metric to the risk velocity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub metric: TrackedMetric,
    pub direction: TrendDirection,
    pub slope: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_risk_level: RiskLevel,
    pub risk_trajectory: RiskTrajectory,
    /// 0-100
    pub projected_risk_score: f64,
    pub risk_velocity: f64,
    pub risk_acceleration: f64,
    /// 0-0.8
    pub confidence_score: f64,
    /// Metrics pushing risk up, largest first
    pub contributing_factors: Vec<ContributingFactor>,
    pub horizon_days: u32,
}

/// Project risk `horizon_days` ahead from the trend map
pub fn predict(trends: &TrendMap, current: &CurrentMetrics, horizon_days: u32) -> PredictionResult {
    let usable: Vec<(TrackedMetric, &TrendResult)> = trends
        .iter()
        .filter(|(_, t)| t.has_data())
        .map(|(m, t)| (*m, t))
        .collect();

    let risk_velocity: f64 = usable
        .iter()
        .map(|(m, t)| m.velocity_weight() * t.slope * VELOCITY_SCALE)
        .sum();
    let risk_acceleration: f64 = usable
        .iter()
        .map(|(m, t)| m.velocity_weight() * t.acceleration * ACCELERATION_SCALE)
        .sum();

    let current_score = current
        .burnout_score
        .or_else(|| {
            trends
                .get(&TrackedMetric::BurnoutScore)
                .filter(|t| t.data_points > 0)
                .map(|t| t.current_value)
        })
        .unwrap_or(0.0);

    let periods = horizon_days as f64 / PROJECTION_PERIOD_DAYS;
    let projected_risk_score = (current_score * 10.0
        + risk_velocity * periods
        + 0.5 * risk_acceleration * periods * periods)
        .clamp(0.0, 100.0);

    let risk_trajectory = if usable.is_empty() {
        RiskTrajectory::InsufficientData
    } else {
        RiskTrajectory::classify(risk_velocity, risk_acceleration)
    };

    let mut contributing_factors: Vec<ContributingFactor> = usable
        .iter()
        .map(|(m, t)| ContributingFactor {
            metric: *m,
            direction: t.direction,
            slope: t.slope,
            contribution: m.velocity_weight() * t.slope * VELOCITY_SCALE,
        })
        .filter(|f| f.contribution > 0.0)
        .collect();
    contributing_factors.sort_by(|a, b| {
        b.contribution
            .total_cmp(&a.contribution)
            .then_with(|| a.metric.cmp(&b.metric))
    });

    let confidence_score = confidence(trends);
    debug!(
        velocity = risk_velocity,
        acceleration = risk_acceleration,
        confidence = confidence_score,
        "risk prediction"
    );

    PredictionResult {
        predicted_risk_level: RiskLevel::from_projected_score(projected_risk_score),
        risk_trajectory,
        projected_risk_score,
        risk_velocity,
        risk_acceleration,
        confidence_score,
        contributing_factors,
        horizon_days,
    }
}

/// `(1 - mean volatility) x share of trends with enough points x 0.8`
fn confidence(trends: &TrendMap) -> f64 {
    if trends.is_empty() {
        return 0.0;
    }
    let count = trends.len() as f64;
    let avg_volatility = trends.values().map(|t| t.volatility).sum::<f64>() / count;
    let well_sampled = trends
        .values()
        .filter(|t| t.data_points >= CONFIDENT_DATA_POINTS)
        .count() as f64
        / count;

    ((1.0 - avg_volatility).max(0.0) * well_sampled * MAX_CONFIDENCE).clamp(0.0, MAX_CONFIDENCE)
}

/// Projected arrival of one metric at its critical threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalTimeline {
    pub days_to_critical: f64,
    pub expected_date: NaiveDate,
    /// Raw change per run (sign as observed)
    pub rate_of_change: f64,
    pub current_value: f64,
    pub critical_threshold: f64,
}

/// Metrics on course to reach their critical threshold within twice the horizon
pub fn timeline(
    trends: &TrendMap,
    current: &CurrentMetrics,
    horizon_days: u32,
    as_of: NaiveDate,
) -> BTreeMap<TrackedMetric, CriticalTimeline> {
    let limit = 2.0 * horizon_days as f64;

    trends
        .iter()
        .filter(|(_, t)| t.has_data() && t.slope.abs() >= MIN_TIMELINE_SLOPE)
        .filter_map(|(metric, t)| {
            let value = current.get(*metric).unwrap_or(t.current_value);
            let threshold = metric.critical_threshold();
            let raw_slope = if metric.is_inverse() { -t.slope } else { t.slope };

            let days = (threshold - value) / raw_slope;
            if !(days > 0.0 && days <= limit) {
                return None;
            }

            Some((
                *metric,
                CriticalTimeline {
                    days_to_critical: days,
                    expected_date: as_of + Duration::days(days.ceil() as i64),
                    rate_of_change: raw_slope,
                    current_value: value,
                    critical_threshold: threshold,
                },
            ))
        })
        .collect()
}
