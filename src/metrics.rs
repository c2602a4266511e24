//! Period-level metrics
//!
//! Rolls daily aggregates up to the analysis window and adds the figures that
//! need raw incident fields (response and resolution times, critical counts,
//! message sentiment).

use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::normalizer::EntityDailyAggregate;
use crate::severity::is_critical_incident;

/// Day-level health penalty caps
const INCIDENT_PENALTY_PER_EVENT: f64 = 8.0;
const INCIDENT_PENALTY_CAP: f64 = 40.0;
const SEVERITY_PENALTY_CAP: f64 = 20.0;
const TIMING_PENALTY_PER_EVENT: f64 = 5.0;
const AFTER_HOURS_PENALTY_CAP: f64 = 15.0;
const WEEKEND_PENALTY_CAP: f64 = 10.0;
const OVERNIGHT_PENALTY_CAP: f64 = 15.0;

/// Health score for a single day (0-100, 100 = no on-call strain).
///
/// Each incident count only ever subtracts, so more incidents never yield a
/// better day.
pub fn daily_health_score(day: &EntityDailyAggregate) -> f64 {
    let incident_penalty =
        (day.incident_count as f64 * INCIDENT_PENALTY_PER_EVENT).min(INCIDENT_PENALTY_CAP);
    let severity_penalty = day.severity_weighted_count.max(0.0).min(SEVERITY_PENALTY_CAP);
    let after_hours_penalty =
        (day.after_hours_count as f64 * TIMING_PENALTY_PER_EVENT).min(AFTER_HOURS_PENALTY_CAP);
    let weekend_penalty =
        (day.weekend_count as f64 * TIMING_PENALTY_PER_EVENT).min(WEEKEND_PENALTY_CAP);
    let overnight_penalty =
        (day.overnight_count as f64 * TIMING_PENALTY_PER_EVENT).min(OVERNIGHT_PENALTY_CAP);

    (100.0
        - incident_penalty
        - severity_penalty
        - after_hours_penalty
        - weekend_penalty
        - overnight_penalty)
        .clamp(0.0, 100.0)
}

/// Aggregate on-call, code and communication metrics for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub days_analyzed: u32,
    pub days_with_incidents: u32,
    pub days_with_activity: u32,
    pub total_incidents: u32,
    pub incidents_per_week: f64,
    pub severity_weighted_total: f64,
    /// `(sum of weights / days_analyzed) * 7`
    pub severity_weighted_per_week: f64,
    pub after_hours_percentage: f64,
    pub weekend_percentage: f64,
    pub overnight_percentage: f64,
    pub high_severity_count: u32,
    /// Incidents in the source's critical tier
    pub critical_incident_count: u32,
    /// Acknowledged minus triggered, when acknowledgement is known
    pub avg_response_time_minutes: Option<f64>,
    /// Resolved minus triggered, when resolution is known
    pub avg_resolution_hours: Option<f64>,
    pub total_commits: u32,
    pub commits_per_week: f64,
    pub after_hours_commit_percentage: f64,
    pub weekend_commit_percentage: f64,
    pub total_messages: u32,
    pub messages_per_day: f64,
    pub avg_sentiment: Option<f64>,
    /// Mean of the daily health scores
    pub avg_daily_health_score: f64,
    /// Events dropped for malformed timestamps
    pub skipped_events: u32,
}

impl PeriodMetrics {
    /// Summarize one entity's window.
    ///
    /// `incidents` and `messages` are that entity's raw streams, used for
    /// fields the daily aggregates do not carry.
    pub fn summarize(
        daily: &[EntityDailyAggregate],
        incidents: &[RawEvent],
        messages: &[RawEvent],
    ) -> Self {
        let days_analyzed = daily.len() as u32;
        if days_analyzed == 0 {
            return Self::default();
        }
        let days = days_analyzed as f64;

        let total_incidents: u32 = daily.iter().map(|d| d.incident_count).sum();
        let severity_weighted_total: f64 = daily.iter().map(|d| d.severity_weighted_count).sum();
        let after_hours: u32 = daily.iter().map(|d| d.after_hours_count).sum();
        let weekend: u32 = daily.iter().map(|d| d.weekend_count).sum();
        let overnight: u32 = daily.iter().map(|d| d.overnight_count).sum();
        let high_severity_count: u32 = daily.iter().map(|d| d.high_severity_count).sum();
        let total_commits: u32 = daily.iter().map(|d| d.commit_count).sum();
        let after_hours_commits: u32 = daily.iter().map(|d| d.after_hours_commit_count).sum();
        let weekend_commits: u32 = daily.iter().map(|d| d.weekend_commit_count).sum();
        let total_messages: u32 = daily.iter().map(|d| d.message_count).sum();

        let (response_times, resolution_times) = incident_durations(incidents);
        let sentiments: Vec<f64> = messages.iter().filter_map(|m| m.sentiment_value()).collect();

        let health_sum: f64 = daily.iter().map(daily_health_score).sum();

        Self {
            days_analyzed,
            days_with_incidents: daily.iter().filter(|d| d.incident_count > 0).count() as u32,
            days_with_activity: daily.iter().filter(|d| d.has_data).count() as u32,
            total_incidents,
            incidents_per_week: total_incidents as f64 / days * 7.0,
            severity_weighted_total,
            severity_weighted_per_week: severity_weighted_total / days * 7.0,
            after_hours_percentage: percentage(after_hours, total_incidents),
            weekend_percentage: percentage(weekend, total_incidents),
            overnight_percentage: percentage(overnight, total_incidents),
            high_severity_count,
            critical_incident_count: incidents
                .iter()
                .filter(|i| is_critical_incident(i))
                .count() as u32,
            avg_response_time_minutes: mean(&response_times),
            avg_resolution_hours: mean(&resolution_times),
            total_commits,
            commits_per_week: total_commits as f64 / days * 7.0,
            after_hours_commit_percentage: percentage(after_hours_commits, total_commits),
            weekend_commit_percentage: percentage(weekend_commits, total_commits),
            total_messages,
            messages_per_day: total_messages as f64 / days,
            avg_sentiment: mean(&sentiments),
            avg_daily_health_score: health_sum / days,
            skipped_events: 0,
        }
    }
}

/// Response minutes and resolution hours for incidents that carry them.
///
/// Negative durations (clock skew, bad data) are ignored.
fn incident_durations(incidents: &[RawEvent]) -> (Vec<f64>, Vec<f64>) {
    let mut response = Vec::new();
    let mut resolution = Vec::new();

    for incident in incidents {
        let Some(started) = incident.occurred_at() else {
            continue;
        };
        if let Some(ack) = incident.acknowledged_at_utc() {
            let minutes = (ack - started).num_seconds() as f64 / 60.0;
            if minutes >= 0.0 {
                response.push(minutes);
            }
        }
        if let Some(resolved) = incident.resolved_at_utc() {
            let hours = (resolved - started).num_seconds() as f64 / 3600.0;
            if hours >= 0.0 {
                resolution.push(hours);
            }
        }
    }

    (response, resolution)
}

fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{DateRange, MetricNormalizer};
    use crate::severity::IncidentSource;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn week() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 21).unwrap(),
        )
    }

    #[test]
    fn test_quiet_day_is_perfect_health() {
        let day = EntityDailyAggregate::empty("alice", week().start);
        assert_eq!(daily_health_score(&day), 100.0);
    }

    #[test]
    fn test_health_score_penalties_are_capped() {
        let mut day = EntityDailyAggregate::empty("alice", week().start);
        day.incident_count = 50;
        day.severity_weighted_count = 500.0;
        day.after_hours_count = 50;
        day.weekend_count = 50;
        day.overnight_count = 50;
        assert_eq!(daily_health_score(&day), 0.0);
    }

    proptest! {
        #[test]
        fn prop_more_incidents_never_improve_health(
            base in 0u32..20,
            extra in 1u32..20,
            weighted in 0.0f64..100.0,
            after_hours in 0u32..5,
            weekend in 0u32..5,
            overnight in 0u32..5,
        ) {
            let mut day = EntityDailyAggregate::empty("alice", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
            day.incident_count = base;
            day.severity_weighted_count = weighted;
            day.after_hours_count = after_hours;
            day.weekend_count = weekend;
            day.overnight_count = overnight;
            let before = daily_health_score(&day);

            day.incident_count = base + extra;
            let after = daily_health_score(&day);
            prop_assert!(after <= before);
        }
    }

    #[test]
    fn test_summarize_week() {
        let incidents = vec![
            RawEvent::incident("i1", "alice", "2024-01-15T12:00:00Z")
                .with_severity("P1")
                .with_source(IncidentSource::PagerDuty)
                .with_acknowledged_at("2024-01-15T12:10:00Z")
                .with_resolved_at("2024-01-15T14:00:00Z"),
            RawEvent::incident("i2", "alice", "2024-01-20T23:00:00Z")
                .with_severity("P2")
                .with_source(IncidentSource::PagerDuty)
                .with_acknowledged_at("2024-01-20T23:20:00Z"),
        ];
        let messages = vec![
            RawEvent::message("m1", "alice", "2024-01-16T10:00:00Z").with_sentiment(0.2),
            RawEvent::message("m2", "alice", "2024-01-16T11:00:00Z").with_sentiment(-0.4),
        ];
        let mut all = incidents.clone();
        all.extend(messages.clone());

        let daily = MetricNormalizer::aggregate("alice", &all, "UTC", &week());
        let period = PeriodMetrics::summarize(&daily, &incidents, &messages);

        assert_eq!(period.days_analyzed, 7);
        assert_eq!(period.total_incidents, 2);
        assert_eq!(period.days_with_incidents, 2);
        assert_eq!(period.days_with_activity, 3);
        assert!((period.incidents_per_week - 2.0).abs() < 1e-9);
        // 15 (business hours) + 12 * 1.8 (Saturday overnight)
        assert!((period.severity_weighted_per_week - 36.6).abs() < 1e-9);
        assert!((period.after_hours_percentage - 50.0).abs() < 1e-9);
        assert!((period.weekend_percentage - 50.0).abs() < 1e-9);
        assert_eq!(period.critical_incident_count, 2);
        assert!((period.avg_response_time_minutes.unwrap() - 15.0).abs() < 1e-9);
        assert!((period.avg_resolution_hours.unwrap() - 2.0).abs() < 1e-9);
        assert!((period.avg_sentiment.unwrap() + 0.1).abs() < 1e-9);
        assert!(period.avg_daily_health_score < 100.0);
    }

    #[test]
    fn test_summarize_empty() {
        let period = PeriodMetrics::summarize(&[], &[], &[]);
        assert_eq!(period, PeriodMetrics::default());
    }
}
