//! Report encoding
//!
//! Wraps entity assessments in a versioned report with producer metadata and
//! a team-level summary.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::pipeline::EntityAssessment;
use crate::types::RiskLevel;
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Team-level roll-up of entity assessments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub entity_count: usize,
    /// Entities per CBI risk level
    pub risk_level_counts: BTreeMap<RiskLevel, usize>,
    /// Mean composite score over entities with any CBI data
    pub average_composite_score: Option<f64>,
    /// Entities at high or critical risk, highest score first
    pub at_risk_entities: Vec<String>,
    /// Entities with at least one early warning
    pub entities_with_warnings: usize,
    /// Mean correlation risk score
    pub average_correlation_risk: Option<f64>,
}

impl TeamSummary {
    pub fn from_assessments(assessments: &[EntityAssessment]) -> Self {
        let mut risk_level_counts = BTreeMap::new();
        for assessment in assessments {
            *risk_level_counts.entry(assessment.cbi.risk_level).or_insert(0) += 1;
        }

        let scored: Vec<f64> = assessments
            .iter()
            .filter(|a| a.cbi.data_completeness > 0.0)
            .map(|a| a.cbi.composite_score)
            .collect();
        let correlation: Vec<f64> = assessments
            .iter()
            .map(|a| a.correlation.risk_score)
            .collect();

        let mut at_risk: Vec<&EntityAssessment> = assessments
            .iter()
            .filter(|a| a.cbi.risk_level >= RiskLevel::High)
            .collect();
        at_risk.sort_by(|a, b| {
            b.cbi
                .composite_score
                .total_cmp(&a.cbi.composite_score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        Self {
            entity_count: assessments.len(),
            risk_level_counts,
            average_composite_score: crate::metrics::mean(&scored),
            at_risk_entities: at_risk.into_iter().map(|a| a.entity_id.clone()).collect(),
            entities_with_warnings: assessments
                .iter()
                .filter(|a| !a.early_warnings.is_empty())
                .count(),
            average_correlation_risk: crate::metrics::mean(&correlation),
        }
    }
}

/// Complete analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub generated_at_utc: String,
    pub entities: Vec<EntityAssessment>,
    pub team_summary: TeamSummary,
}

/// Encoder stamping reports with producer metadata
#[derive(Debug, Clone)]
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, assessments: Vec<EntityAssessment>) -> AnalysisReport {
        let team_summary = TeamSummary::from_assessments(&assessments);

        AnalysisReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at_utc: Utc::now().to_rfc3339(),
            entities: assessments,
            team_summary,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, assessments: Vec<EntityAssessment>) -> Result<String, EngineError> {
        let report = self.encode(assessments);
        serde_json::to_string_pretty(&report).map_err(EngineError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use crate::pipeline::{BurnoutAnalyzer, EntityInput};
    use chrono::NaiveDate;

    fn assessments() -> Vec<EntityAssessment> {
        let analyzer = BurnoutAnalyzer::default();
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let busy = EntityInput::new("alice")
            .with_as_of(as_of)
            .with_incidents(
                (0..20)
                    .map(|i| {
                        RawEvent::incident(
                            &format!("i{i}"),
                            "alice",
                            &format!("2024-01-{:02}T23:30:00Z", 6 + i),
                        )
                        .with_severity("sev0")
                    })
                    .collect(),
            );
        let quiet = EntityInput::new("bob").with_as_of(as_of);

        analyzer.analyze_team(&[busy, quiet])
    }

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(assessments());

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, ENGINE_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.entities.len(), 2);

        let summary = &report.team_summary;
        assert_eq!(summary.entity_count, 2);
        assert_eq!(summary.risk_level_counts.values().sum::<usize>(), 2);
        // bob has no data and is excluded from the average
        assert_eq!(
            summary.average_composite_score,
            Some(report.entities[0].cbi.composite_score)
        );
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let json = encoder.encode_to_json(assessments()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("report_version").is_some());
        assert!(parsed.get("producer").is_some());
        assert!(parsed.get("generated_at_utc").is_some());
        assert_eq!(parsed["entities"][0]["entity_id"], "alice");
        assert!(parsed["team_summary"]["risk_level_counts"].is_object());
    }
}
