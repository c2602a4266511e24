//! CBI dimension and composite scoring
//!
//! Each factor value is clamped to >= 0 and normalized against its
//! `scale_max` to 0-100. A dimension score is the weighted mean over the
//! factors actually present: missing factors are excluded from both the
//! numerator and the denominator rather than counted as zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cbi::config::{CbiConfig, CbiFactor, Dimension, DimensionWeights, FactorWeights, ScoreBands};
use crate::types::RiskLevel;

/// Raw factor values keyed by factor
pub type FactorMetrics = BTreeMap<CbiFactor, f64>;

/// CBI interpretation band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpretation {
    Low,
    Mild,
    Moderate,
    High,
}

impl Interpretation {
    /// Band a 0-100 score (low bound inclusive, final band includes 100)
    pub fn from_score(score: f64, bands: &ScoreBands) -> Self {
        if score.is_nan() || score < bands.mild {
            Interpretation::Low
        } else if score < bands.moderate {
            Interpretation::Mild
        } else if score < bands.high {
            Interpretation::Moderate
        } else {
            Interpretation::High
        }
    }

    pub fn risk_level(self) -> RiskLevel {
        match self {
            Interpretation::Low => RiskLevel::Low,
            Interpretation::Mild => RiskLevel::Medium,
            Interpretation::Moderate => RiskLevel::High,
            Interpretation::High => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interpretation::Low => "low",
            Interpretation::Mild => "mild",
            Interpretation::Moderate => "moderate",
            Interpretation::High => "high",
        }
    }
}

/// Band a score with the reference bands
pub fn interpret(score: f64) -> Interpretation {
    Interpretation::from_score(score, &ScoreBands::default())
}

/// Contribution of one factor to a dimension score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorComponent {
    pub factor: CbiFactor,
    pub dimension: Dimension,
    pub raw_value: f64,
    /// 0-100
    pub normalized_value: f64,
    pub weight: f64,
    /// normalized_value * weight
    pub weighted_score: f64,
}

/// Score of one CBI dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 0-100
    pub score: f64,
    pub components: Vec<FactorComponent>,
    /// Fraction of the dimension's weight that was observed (0-1)
    pub data_completeness: f64,
}

/// Composite CBI result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CbiResult {
    pub personal_score: f64,
    pub work_related_score: f64,
    pub composite_score: f64,
    pub interpretation: Interpretation,
    pub risk_level: RiskLevel,
    pub per_factor_breakdown: Vec<FactorComponent>,
    /// Dimension-weighted data completeness (0-1)
    pub data_completeness: f64,
}

/// Score one dimension against its factor configuration
pub fn score_dimension(metrics: &FactorMetrics, factors: &FactorWeights) -> DimensionScore {
    let total_weight: f64 = factors.values().map(|s| s.weight).sum();
    let mut components = Vec::new();
    let mut weighted_sum = 0.0;
    let mut present_weight = 0.0;

    for (factor, spec) in factors {
        let Some(&raw) = metrics.get(factor) else {
            continue;
        };
        if !raw.is_finite() {
            debug!(factor = %factor, "ignoring non-finite factor value");
            continue;
        }

        let raw_value = raw.max(0.0);
        let normalized_value = (raw_value / spec.scale_max * 100.0).min(100.0);
        let weighted_score = normalized_value * spec.weight;

        weighted_sum += weighted_score;
        present_weight += spec.weight;
        components.push(FactorComponent {
            factor: *factor,
            dimension: factor.dimension(),
            raw_value,
            normalized_value,
            weight: spec.weight,
            weighted_score,
        });
    }

    if components.is_empty() || present_weight <= 0.0 {
        return DimensionScore {
            score: 0.0,
            components,
            data_completeness: 0.0,
        };
    }

    DimensionScore {
        score: weighted_sum / present_weight,
        components,
        data_completeness: if total_weight > 0.0 {
            (present_weight / total_weight).min(1.0)
        } else {
            0.0
        },
    }
}

/// Combine two dimension scores with the reference bands
pub fn score_composite(personal: f64, work_related: f64, weights: DimensionWeights) -> CbiResult {
    compose(personal, work_related, weights, &ScoreBands::default(), Vec::new(), 0.0)
}

fn compose(
    personal: f64,
    work_related: f64,
    weights: DimensionWeights,
    bands: &ScoreBands,
    per_factor_breakdown: Vec<FactorComponent>,
    data_completeness: f64,
) -> CbiResult {
    let weight_total = weights.personal + weights.work_related;
    let composite_score = if weight_total > 0.0 {
        (personal * weights.personal + work_related * weights.work_related) / weight_total
    } else {
        0.0
    }
    .clamp(0.0, 100.0);

    let interpretation = Interpretation::from_score(composite_score, bands);

    CbiResult {
        personal_score: personal,
        work_related_score: work_related,
        composite_score,
        interpretation,
        risk_level: interpretation.risk_level(),
        per_factor_breakdown,
        data_completeness,
    }
}

/// Scorer bound to one immutable configuration
#[derive(Debug, Clone, Copy)]
pub struct CbiScorer<'a> {
    config: &'a CbiConfig,
}

impl<'a> CbiScorer<'a> {
    pub fn new(config: &'a CbiConfig) -> Self {
        Self { config }
    }

    pub fn personal(&self, metrics: &FactorMetrics) -> DimensionScore {
        score_dimension(metrics, self.config.personal_burnout())
    }

    pub fn work_related(&self, metrics: &FactorMetrics) -> DimensionScore {
        score_dimension(metrics, self.config.work_related_burnout())
    }

    /// Score both dimensions and combine them.
    ///
    /// A single metrics map may hold factors of both dimensions; each
    /// dimension only reads its own factors.
    pub fn score(&self, metrics: &FactorMetrics) -> CbiResult {
        let personal = self.personal(metrics);
        let work_related = self.work_related(metrics);
        let weights = self.config.dimension_weights();

        let completeness =
            personal.data_completeness * weights.personal + work_related.data_completeness * weights.work_related;

        let mut breakdown = personal.components;
        breakdown.extend(work_related.components);

        compose(
            personal.score,
            work_related.score,
            weights,
            &self.config.bands(),
            breakdown,
            completeness,
        )
    }

    /// Combine precomputed dimension scores with this configuration
    pub fn score_composite(&self, personal: f64, work_related: f64) -> CbiResult {
        compose(
            personal,
            work_related,
            self.config.dimension_weights(),
            &self.config.bands(),
            Vec::new(),
            0.0,
        )
    }
}
