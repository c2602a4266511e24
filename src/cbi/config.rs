//! CBI factor configuration
//!
//! The configuration is validated once, when it is built or deserialized, and
//! is immutable afterwards. An invalid weight set is a programming error and
//! is reported as a [`ConfigError`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed deviation when checking that weights sum to 1
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// CBI dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "personal_burnout")]
    Personal,
    #[serde(rename = "work_related_burnout")]
    WorkRelated,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Personal => "personal_burnout",
            Dimension::WorkRelated => "work_related_burnout",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of CBI factor identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CbiFactor {
    // Personal burnout
    WorkHoursTrend,
    WeekendWork,
    AfterHoursActivity,
    VacationUsage,
    SleepQualityProxy,
    // Work-related burnout
    SprintCompletion,
    CodeReviewSpeed,
    PrFrequency,
    DeploymentFrequency,
    MeetingLoad,
    OncallBurden,
}

impl CbiFactor {
    pub const PERSONAL: [CbiFactor; 5] = [
        CbiFactor::WorkHoursTrend,
        CbiFactor::WeekendWork,
        CbiFactor::AfterHoursActivity,
        CbiFactor::VacationUsage,
        CbiFactor::SleepQualityProxy,
    ];

    pub const WORK_RELATED: [CbiFactor; 6] = [
        CbiFactor::SprintCompletion,
        CbiFactor::CodeReviewSpeed,
        CbiFactor::PrFrequency,
        CbiFactor::DeploymentFrequency,
        CbiFactor::MeetingLoad,
        CbiFactor::OncallBurden,
    ];

    pub fn dimension(&self) -> Dimension {
        match self {
            CbiFactor::WorkHoursTrend
            | CbiFactor::WeekendWork
            | CbiFactor::AfterHoursActivity
            | CbiFactor::VacationUsage
            | CbiFactor::SleepQualityProxy => Dimension::Personal,
            CbiFactor::SprintCompletion
            | CbiFactor::CodeReviewSpeed
            | CbiFactor::PrFrequency
            | CbiFactor::DeploymentFrequency
            | CbiFactor::MeetingLoad
            | CbiFactor::OncallBurden => Dimension::WorkRelated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CbiFactor::WorkHoursTrend => "work_hours_trend",
            CbiFactor::WeekendWork => "weekend_work",
            CbiFactor::AfterHoursActivity => "after_hours_activity",
            CbiFactor::VacationUsage => "vacation_usage",
            CbiFactor::SleepQualityProxy => "sleep_quality_proxy",
            CbiFactor::SprintCompletion => "sprint_completion",
            CbiFactor::CodeReviewSpeed => "code_review_speed",
            CbiFactor::PrFrequency => "pr_frequency",
            CbiFactor::DeploymentFrequency => "deployment_frequency",
            CbiFactor::MeetingLoad => "meeting_load",
            CbiFactor::OncallBurden => "oncall_burden",
        }
    }
}

impl fmt::Display for CbiFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight and normalization scale of one factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    pub weight: f64,
    /// Raw value that normalizes to 100
    pub scale_max: f64,
}

impl FactorSpec {
    pub const fn new(weight: f64, scale_max: f64) -> Self {
        Self { weight, scale_max }
    }
}

/// Factor specs of one dimension
pub type FactorWeights = BTreeMap<CbiFactor, FactorSpec>;

/// Relative weight of each dimension in the composite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub personal: f64,
    pub work_related: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            personal: 0.5,
            work_related: 0.5,
        }
    }
}

/// Lower bounds of the mild, moderate and high bands.
///
/// Bands are `[0, mild)`, `[mild, moderate)`, `[moderate, high)`, `[high, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBands {
    pub mild: f64,
    pub moderate: f64,
    pub high: f64,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            mild: 25.0,
            moderate: 50.0,
            high: 75.0,
        }
    }
}

/// Configuration invariant violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{dimension} factor weights sum to {sum:.4}, expected 1.0")]
    FactorWeightSum { dimension: Dimension, sum: f64 },

    #[error("dimension weights sum to {sum:.4}, expected 1.0")]
    DimensionWeightSum { sum: f64 },

    #[error("factor {factor} has non-positive scale_max {scale_max}")]
    InvalidScaleMax { factor: CbiFactor, scale_max: f64 },

    #[error("factor {factor} has invalid weight {weight}")]
    InvalidWeight { factor: CbiFactor, weight: f64 },

    #[error("factor {factor} does not belong to {dimension}")]
    MisplacedFactor { factor: CbiFactor, dimension: Dimension },

    #[error("{0} has no factors")]
    EmptyDimension(Dimension),

    #[error("score bands must satisfy 0 < mild < moderate < high < 100, got {mild}/{moderate}/{high}")]
    InvalidBands { mild: f64, moderate: f64, high: f64 },

    #[error("{field} must be between 1 and {max} days, got {days}")]
    InvalidDays { field: &'static str, days: u32, max: u32 },
}

/// Validated, immutable CBI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedCbiConfig")]
pub struct CbiConfig {
    personal_burnout: FactorWeights,
    work_related_burnout: FactorWeights,
    dimension_weights: DimensionWeights,
    bands: ScoreBands,
}

#[derive(Deserialize)]
struct UncheckedCbiConfig {
    personal_burnout: FactorWeights,
    work_related_burnout: FactorWeights,
    #[serde(default)]
    dimension_weights: DimensionWeights,
    #[serde(default)]
    bands: ScoreBands,
}

impl TryFrom<UncheckedCbiConfig> for CbiConfig {
    type Error = ConfigError;

    fn try_from(raw: UncheckedCbiConfig) -> Result<Self, Self::Error> {
        CbiConfig::new(
            raw.personal_burnout,
            raw.work_related_burnout,
            raw.dimension_weights,
            raw.bands,
        )
    }
}

impl Default for CbiConfig {
    fn default() -> Self {
        let personal = FactorWeights::from([
            (CbiFactor::WorkHoursTrend, FactorSpec::new(0.20, 100.0)),
            (CbiFactor::WeekendWork, FactorSpec::new(0.20, 100.0)),
            (CbiFactor::AfterHoursActivity, FactorSpec::new(0.20, 100.0)),
            (CbiFactor::VacationUsage, FactorSpec::new(0.15, 100.0)),
            (CbiFactor::SleepQualityProxy, FactorSpec::new(0.25, 100.0)),
        ]);
        let work_related = FactorWeights::from([
            (CbiFactor::SprintCompletion, FactorSpec::new(0.15, 100.0)),
            (CbiFactor::CodeReviewSpeed, FactorSpec::new(0.15, 100.0)),
            // commits per week
            (CbiFactor::PrFrequency, FactorSpec::new(0.10, 20.0)),
            // deploys per week
            (CbiFactor::DeploymentFrequency, FactorSpec::new(0.20, 10.0)),
            // messages per day
            (CbiFactor::MeetingLoad, FactorSpec::new(0.20, 50.0)),
            // severity-weighted incidents per week
            (CbiFactor::OncallBurden, FactorSpec::new(0.20, 100.0)),
        ]);

        Self {
            personal_burnout: personal,
            work_related_burnout: work_related,
            dimension_weights: DimensionWeights::default(),
            bands: ScoreBands::default(),
        }
    }
}

impl CbiConfig {
    /// Build a configuration, checking every invariant
    pub fn new(
        personal_burnout: FactorWeights,
        work_related_burnout: FactorWeights,
        dimension_weights: DimensionWeights,
        bands: ScoreBands,
    ) -> Result<Self, ConfigError> {
        validate_dimension(Dimension::Personal, &personal_burnout)?;
        validate_dimension(Dimension::WorkRelated, &work_related_burnout)?;

        let dimension_sum = dimension_weights.personal + dimension_weights.work_related;
        if dimension_weights.personal < 0.0
            || dimension_weights.work_related < 0.0
            || (dimension_sum - 1.0).abs() > WEIGHT_TOLERANCE
        {
            return Err(ConfigError::DimensionWeightSum { sum: dimension_sum });
        }

        if !(bands.mild > 0.0
            && bands.mild < bands.moderate
            && bands.moderate < bands.high
            && bands.high < 100.0)
        {
            return Err(ConfigError::InvalidBands {
                mild: bands.mild,
                moderate: bands.moderate,
                high: bands.high,
            });
        }

        Ok(Self {
            personal_burnout,
            work_related_burnout,
            dimension_weights,
            bands,
        })
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, crate::error::EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn personal_burnout(&self) -> &FactorWeights {
        &self.personal_burnout
    }

    pub fn work_related_burnout(&self) -> &FactorWeights {
        &self.work_related_burnout
    }

    pub fn factors(&self, dimension: Dimension) -> &FactorWeights {
        match dimension {
            Dimension::Personal => &self.personal_burnout,
            Dimension::WorkRelated => &self.work_related_burnout,
        }
    }

    pub fn dimension_weights(&self) -> DimensionWeights {
        self.dimension_weights
    }

    pub fn bands(&self) -> ScoreBands {
        self.bands
    }
}

fn validate_dimension(dimension: Dimension, factors: &FactorWeights) -> Result<(), ConfigError> {
    if factors.is_empty() {
        return Err(ConfigError::EmptyDimension(dimension));
    }

    for (factor, spec) in factors {
        if factor.dimension() != dimension {
            return Err(ConfigError::MisplacedFactor {
                factor: *factor,
                dimension,
            });
        }
        if !spec.weight.is_finite() || spec.weight < 0.0 {
            return Err(ConfigError::InvalidWeight {
                factor: *factor,
                weight: spec.weight,
            });
        }
        if !spec.scale_max.is_finite() || spec.scale_max <= 0.0 {
            return Err(ConfigError::InvalidScaleMax {
                factor: *factor,
                scale_max: spec.scale_max,
            });
        }
    }

    let sum: f64 = factors.values().map(|s| s.weight).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(ConfigError::FactorWeightSum { dimension, sum });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sum(factors: &FactorWeights) -> f64 {
        factors.values().map(|s| s.weight).sum()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CbiConfig::default();
        let rebuilt = CbiConfig::new(
            config.personal_burnout().clone(),
            config.work_related_burnout().clone(),
            config.dimension_weights(),
            config.bands(),
        );
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn test_weights_sum_to_one() {
        let config = CbiConfig::default();
        assert!((weight_sum(config.personal_burnout()) - 1.0).abs() <= WEIGHT_TOLERANCE);
        assert!((weight_sum(config.work_related_burnout()) - 1.0).abs() <= WEIGHT_TOLERANCE);

        let dims = config.dimension_weights();
        assert!((dims.personal + dims.work_related - 1.0).abs() <= WEIGHT_TOLERANCE);
    }

    #[test]
    fn test_factor_dimensions_match_tables() {
        for factor in CbiFactor::PERSONAL {
            assert_eq!(factor.dimension(), Dimension::Personal);
        }
        for factor in CbiFactor::WORK_RELATED {
            assert_eq!(factor.dimension(), Dimension::WorkRelated);
        }
    }

    #[test]
    fn test_rejects_bad_weight_sum() {
        let mut personal = CbiConfig::default().personal_burnout().clone();
        personal.insert(CbiFactor::WeekendWork, FactorSpec::new(0.5, 100.0));
        let err = CbiConfig::new(
            personal,
            CbiConfig::default().work_related_burnout().clone(),
            DimensionWeights::default(),
            ScoreBands::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FactorWeightSum {
                dimension: Dimension::Personal,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_zero_scale_max() {
        let mut work = CbiConfig::default().work_related_burnout().clone();
        work.insert(CbiFactor::MeetingLoad, FactorSpec::new(0.20, 0.0));
        let err = CbiConfig::new(
            CbiConfig::default().personal_burnout().clone(),
            work,
            DimensionWeights::default(),
            ScoreBands::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidScaleMax { .. }));
    }

    #[test]
    fn test_rejects_misplaced_factor() {
        let personal = FactorWeights::from([(CbiFactor::OncallBurden, FactorSpec::new(1.0, 100.0))]);
        let err = CbiConfig::new(
            personal,
            CbiConfig::default().work_related_burnout().clone(),
            DimensionWeights::default(),
            ScoreBands::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MisplacedFactor { .. }));
    }

    #[test]
    fn test_rejects_bad_dimension_weights_and_bands() {
        let config = CbiConfig::default();
        let err = CbiConfig::new(
            config.personal_burnout().clone(),
            config.work_related_burnout().clone(),
            DimensionWeights {
                personal: 0.7,
                work_related: 0.7,
            },
            ScoreBands::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DimensionWeightSum { .. }));

        let err = CbiConfig::new(
            config.personal_burnout().clone(),
            config.work_related_burnout().clone(),
            DimensionWeights::default(),
            ScoreBands {
                mild: 50.0,
                moderate: 25.0,
                high: 75.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBands { .. }));
    }

    #[test]
    fn test_json_round_trip_validates() {
        let config = CbiConfig::default();
        let json = config.to_json().unwrap();
        let loaded = CbiConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);

        let broken = json.replace("0.25", "0.95");
        assert!(CbiConfig::from_json(&broken).is_err());
    }
}
