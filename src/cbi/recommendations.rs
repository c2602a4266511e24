//! Rule-based recommendations from a CBI result

use serde::{Deserialize, Serialize};

use crate::cbi::config::Dimension;
use crate::cbi::scorer::CbiResult;

/// Composite score at or above which immediate intervention is advised
pub const INTERVENTION_THRESHOLD: f64 = 75.0;

/// Composite score at or above which workload reduction is advised
pub const WORKLOAD_THRESHOLD: f64 = 50.0;

/// Composite score at or above which close monitoring is advised
pub const MONITOR_THRESHOLD: f64 = 25.0;

/// Points by which one dimension must exceed the other to be called out
pub const DIMENSION_GAP: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ImmediateIntervention,
    ReduceWorkload,
    MonitorClosely,
    MaintainPractices,
    PersonalRecoveryFocus,
    WorkloadRebalancing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    /// Dimension the recommendation targets, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
}

impl Recommendation {
    fn new(kind: RecommendationKind, priority: Priority) -> Self {
        Self {
            kind,
            priority,
            dimension: None,
        }
    }
}

/// Recommendations for a scored entity.
///
/// Exactly one composite-level recommendation, followed by at most one
/// dimension-gap recommendation.
pub fn recommend(result: &CbiResult) -> Vec<Recommendation> {
    let score = result.composite_score;
    let mut recommendations = vec![if score >= INTERVENTION_THRESHOLD {
        Recommendation::new(RecommendationKind::ImmediateIntervention, Priority::Urgent)
    } else if score >= WORKLOAD_THRESHOLD {
        Recommendation::new(RecommendationKind::ReduceWorkload, Priority::High)
    } else if score >= MONITOR_THRESHOLD {
        Recommendation::new(RecommendationKind::MonitorClosely, Priority::Medium)
    } else {
        Recommendation::new(RecommendationKind::MaintainPractices, Priority::Low)
    }];

    let gap = result.personal_score - result.work_related_score;
    if gap > DIMENSION_GAP {
        recommendations.push(Recommendation {
            kind: RecommendationKind::PersonalRecoveryFocus,
            priority: Priority::Medium,
            dimension: Some(Dimension::Personal),
        });
    } else if -gap > DIMENSION_GAP {
        recommendations.push(Recommendation {
            kind: RecommendationKind::WorkloadRebalancing,
            priority: Priority::Medium,
            dimension: Some(Dimension::WorkRelated),
        });
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbi::config::DimensionWeights;
    use crate::cbi::scorer::score_composite;

    fn kinds(personal: f64, work_related: f64) -> Vec<RecommendationKind> {
        recommend(&score_composite(personal, work_related, DimensionWeights::default()))
            .into_iter()
            .map(|r| r.kind)
            .collect()
    }

    #[test]
    fn test_composite_thresholds() {
        assert_eq!(kinds(75.0, 75.0), vec![RecommendationKind::ImmediateIntervention]);
        assert_eq!(kinds(74.0, 74.0), vec![RecommendationKind::ReduceWorkload]);
        assert_eq!(kinds(50.0, 50.0), vec![RecommendationKind::ReduceWorkload]);
        assert_eq!(kinds(25.0, 25.0), vec![RecommendationKind::MonitorClosely]);
        assert_eq!(kinds(24.0, 24.0), vec![RecommendationKind::MaintainPractices]);
    }

    #[test]
    fn test_dimension_gap() {
        assert_eq!(
            kinds(60.0, 40.0),
            vec![
                RecommendationKind::ReduceWorkload,
                RecommendationKind::PersonalRecoveryFocus
            ]
        );
        assert_eq!(
            kinds(20.0, 40.0),
            vec![
                RecommendationKind::MonitorClosely,
                RecommendationKind::WorkloadRebalancing
            ]
        );
        // exactly 15 points apart is not a gap
        assert_eq!(kinds(40.0, 25.0), vec![RecommendationKind::MonitorClosely]);
    }

    #[test]
    fn test_priority_and_dimension() {
        let recs = recommend(&score_composite(90.0, 60.0, DimensionWeights::default()));
        assert_eq!(recs[0].priority, Priority::Urgent);
        assert_eq!(recs[1].dimension, Some(Dimension::Personal));
    }
}
