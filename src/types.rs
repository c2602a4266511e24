//! Shared vocabulary types
//!
//! Labels in this module are part of the external JSON contract and are
//! serialized in lowercase.

use serde::{Deserialize, Serialize};

/// Risk level label shared by the CBI scorer and the predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Map a projected 0-100 risk score to a level (>=70 critical, >=50 high, >=30 medium)
    pub fn from_projected_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskLevel::Critical
        } else if score >= 50.0 {
            RiskLevel::High
        } else if score >= 30.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projected_score_levels() {
        assert_eq!(RiskLevel::from_projected_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_projected_score(29.99), RiskLevel::Low);
        assert_eq!(RiskLevel::from_projected_score(30.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_projected_score(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_projected_score(70.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_projected_score(100.0), RiskLevel::Critical);
    }

    #[test]
    fn test_serialized_labels() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        assert_eq!(RiskLevel::Medium.as_str(), "medium");
    }
}
