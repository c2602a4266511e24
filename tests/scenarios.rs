//! End-to-end scenarios across scoring, trauma, correlation and the
//! stateful processor.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;

use burnout_engine::cbi::{CbiConfig, CbiFactor, CbiScorer, FactorMetrics, Interpretation};
use burnout_engine::trauma::analyze_incidents;
use burnout_engine::trend::{TrackedMetric, TrendDirection};
use burnout_engine::{
    correlate, BurnoutAnalyzer, BurnoutProcessor, EntityInput, RawEvent, RiskLevel,
};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

/// `count` SEV0 pages at 02:00 UTC on consecutive days ending on the 31st
fn nightly_pages(entity: &str, count: u32) -> EntityInput {
    let incidents = (0..count)
        .map(|i| {
            let day = 31 - i;
            RawEvent::incident(
                &format!("{entity}-{day}"),
                entity,
                &format!("2024-01-{day:02}T02:00:00Z"),
            )
            .with_severity("SEV0")
        })
        .collect();
    EntityInput::new(entity)
        .with_as_of(as_of())
        .with_incidents(incidents)
}

#[test]
fn test_personal_dimension_from_full_metrics() {
    let metrics: FactorMetrics = BTreeMap::from([
        (CbiFactor::WorkHoursTrend, 50.0),
        (CbiFactor::WeekendWork, 20.0),
        (CbiFactor::AfterHoursActivity, 25.0),
        (CbiFactor::VacationUsage, 60.0),
        (CbiFactor::SleepQualityProxy, 15.0),
    ]);
    let config = CbiConfig::default();
    let personal = CbiScorer::new(&config).personal(&metrics);

    assert!(personal.score > 0.0 && personal.score < 100.0);
    assert_eq!(personal.data_completeness, 1.0);
    assert_eq!(personal.components.len(), 5);
}

#[test]
fn test_composite_of_two_dimensions() {
    let config = CbiConfig::default();
    let result = CbiScorer::new(&config).score_composite(60.0, 40.0);

    assert_eq!(result.composite_score, 50.0);
    assert_eq!(result.interpretation, Interpretation::Moderate);
    assert_eq!(result.risk_level, RiskLevel::High);
}

#[test]
fn test_compound_trauma_from_spaced_critical_incidents() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let incidents: Vec<RawEvent> = (0..6)
        .map(|i| {
            let at = start + Duration::hours(72 * i);
            RawEvent::incident(&format!("i{i}"), "alice", &at.to_rfc3339()).with_severity("critical")
        })
        .collect();

    let trauma = analyze_incidents(&incidents);
    assert!(trauma.compound_trauma_detected);
    assert!((trauma.compound_trauma_factor - 1.02).abs() < 1e-9);
    assert_eq!(trauma.recovery_violations, 0);
}

#[test]
fn test_negative_bursts_feed_incidents() {
    let mut messages = Vec::new();
    let mut incidents = Vec::new();
    for (n, day) in [8u32, 10, 12, 14].into_iter().enumerate() {
        let burst_start = Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap();
        for i in 0..3 {
            let at = burst_start + Duration::minutes(10 * i);
            messages.push(
                RawEvent::message(&format!("m{n}-{i}"), "alice", &at.to_rfc3339()).with_sentiment(-0.3),
            );
        }
        let incident_at = burst_start + Duration::minutes(20) + Duration::hours(10);
        incidents.push(RawEvent::incident(&format!("i{n}"), "alice", &incident_at.to_rfc3339()));
    }

    let result = correlate(&incidents, &[], &messages);
    let propagation = &result.stress_propagation;
    assert!(propagation.communication_to_incident_cycle);
    assert!(propagation.stress_amplification_factor >= 1.5);
}

#[test]
fn test_full_assessment_of_paged_engineer() {
    let mut input = nightly_pages("alice", 20);
    input.commits = (0..20)
        .map(|i| {
            let day = 31 - i;
            RawEvent::commit(&format!("c{day}"), "alice", &format!("2024-01-{day:02}T02:40:00Z"))
                .with_text("hotfix: retry storm")
        })
        .collect();

    let assessment = BurnoutAnalyzer::default().analyze_entity(&input);

    assert_eq!(assessment.window.end, as_of());
    assert_eq!(assessment.period.total_incidents, 20);
    assert_eq!(assessment.period.skipped_events, 0);
    assert!(assessment.trauma.compound_trauma_detected);
    assert!(assessment.factors.contains_key(&CbiFactor::OncallBurden));
    assert!(assessment.factors.contains_key(&CbiFactor::PrFrequency));
    assert!(assessment.cbi.composite_score > 0.0);
    assert!(assessment.cbi.data_completeness > 0.0);
    assert!(!assessment.recommendations.is_empty());
    assert!(assessment.correlation.events_analyzed >= 40);
    assert!(assessment.correlation.risk_score > 0.0);
}

#[test]
fn test_malformed_events_are_counted_not_fatal() {
    let mut input = nightly_pages("alice", 5);
    input
        .incidents
        .push(RawEvent::incident("bad", "alice", "yesterday-ish").with_severity("SEV1"));

    let assessment = BurnoutAnalyzer::default().analyze_entity(&input);
    assert_eq!(assessment.period.total_incidents, 5);
    assert_eq!(assessment.period.skipped_events, 1);
}

#[test]
fn test_escalating_load_across_runs() {
    let mut processor = BurnoutProcessor::new();
    for count in [4, 8, 12] {
        processor.process(&[nightly_pages("alice", count)]);
    }
    let report = processor.process(&[nightly_pages("alice", 16)]);

    let assessment = &report.entities[0];
    let load = &assessment.trends[&TrackedMetric::IncidentLoad];
    assert_eq!(load.data_points, 4);
    assert_eq!(load.direction, TrendDirection::Increasing);
    assert!(assessment
        .prediction
        .contributing_factors
        .iter()
        .any(|f| f.metric == TrackedMetric::IncidentLoad));
    assert_eq!(report.team_summary.entity_count, 1);
}

#[test]
fn test_history_survives_reload() {
    let mut first = BurnoutProcessor::new();
    first.process(&[nightly_pages("alice", 4), nightly_pages("bob", 2)]);
    let saved = first.save_history().unwrap();

    let mut second = BurnoutProcessor::new();
    second.load_history(&saved).unwrap();
    assert_eq!(second.history().len(), 2);

    let report = second.process(&[nightly_pages("alice", 8)]);
    let load = &report.entities[0].trends[&TrackedMetric::IncidentLoad];
    assert_eq!(load.data_points, 2);
    assert!(load.direction.is_increasing());
}

#[test]
fn test_team_report_json() {
    let inputs = vec![nightly_pages("alice", 25), EntityInput::new("bob").with_as_of(as_of())];
    let json = serde_json::to_string(&inputs).unwrap();

    let report: serde_json::Value =
        serde_json::from_str(&burnout_engine::analyze_team_json(&json).unwrap()).unwrap();
    assert_eq!(report["team_summary"]["entity_count"], 2);
    assert_eq!(report["entities"][0]["entity_id"], "alice");
    assert_eq!(report["entities"][1]["cbi"]["data_completeness"], 0.0);
    assert_eq!(report["producer"]["name"], burnout_engine::PRODUCER_NAME);
}
