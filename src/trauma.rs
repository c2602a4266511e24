//! Compound trauma and recovery analysis
//!
//! Repeated critical incidents compound nonlinearly, and short gaps between
//! incidents leave no room to recover. Both effects are derived from the
//! chronological incident stream of a single entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::severity::is_critical_incident;

/// Critical incidents needed before compounding kicks in
pub const COMPOUND_TRAUMA_THRESHOLD: u32 = 5;

/// Upper bound of the compound trauma multiplier
pub const MAX_COMPOUND_TRAUMA_FACTOR: f64 = 2.0;

/// Gaps shorter than this are recovery violations
pub const MIN_RECOVERY_HOURS: f64 = 48.0;

/// Average gap that scores 0
const RECOVERY_FLOOR_HOURS: f64 = 24.0;

/// Average gap that scores 100 (one week)
const RECOVERY_IDEAL_HOURS: f64 = 168.0;

/// Trauma and recovery assessment for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraumaAnalysis {
    pub critical_incident_count: u32,
    pub compound_trauma_detected: bool,
    pub compound_trauma_factor: f64,
    /// 0-100, 100 = fully recovered between incidents
    pub recovery_score: f64,
    /// Consecutive incidents less than 48h apart
    pub recovery_violations: u32,
    /// Shortest gap between consecutive incidents
    pub min_recovery_hours: Option<f64>,
    /// Mean gap between consecutive incidents
    pub avg_recovery_hours: Option<f64>,
}

/// Nonlinear multiplier for repeated critical incidents.
///
/// Flat below 5, +2% per incident up to 10, then +15% per incident, capped at 2x.
pub fn compound_trauma_factor(critical_incident_count: u32) -> f64 {
    if critical_incident_count < COMPOUND_TRAUMA_THRESHOLD {
        1.0
    } else if critical_incident_count <= 10 {
        1.0 + (critical_incident_count - COMPOUND_TRAUMA_THRESHOLD) as f64 * 0.02
    } else {
        (1.1 + (critical_incident_count - 10) as f64 * 0.15).min(MAX_COMPOUND_TRAUMA_FACTOR)
    }
}

/// Analyze incident spacing and critical-incident load
pub fn analyze(incident_timestamps: &[DateTime<Utc>], critical_incident_count: u32) -> TraumaAnalysis {
    let mut sorted = incident_timestamps.to_vec();
    sorted.sort();

    let gaps: Vec<f64> = sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / 3600.0)
        .collect();

    let recovery_violations = gaps.iter().filter(|&&g| g < MIN_RECOVERY_HOURS).count() as u32;
    let min_recovery_hours = gaps.iter().copied().reduce(f64::min);
    let avg_recovery_hours = if gaps.is_empty() {
        None
    } else {
        Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
    };

    let recovery_score = match avg_recovery_hours {
        None => 100.0,
        Some(avg) => ((avg - RECOVERY_FLOOR_HOURS) / (RECOVERY_IDEAL_HOURS - RECOVERY_FLOOR_HOURS)
            * 100.0)
            .clamp(0.0, 100.0),
    };

    TraumaAnalysis {
        critical_incident_count,
        compound_trauma_detected: critical_incident_count >= COMPOUND_TRAUMA_THRESHOLD,
        compound_trauma_factor: compound_trauma_factor(critical_incident_count),
        recovery_score,
        recovery_violations,
        min_recovery_hours,
        avg_recovery_hours,
    }
}

/// Analyze a raw incident stream, counting critical incidents per source tier
pub fn analyze_incidents(incidents: &[RawEvent]) -> TraumaAnalysis {
    let mut timestamps = Vec::with_capacity(incidents.len());
    let mut critical = 0;

    for incident in incidents {
        let Some(at) = incident.occurred_at() else {
            continue;
        };
        timestamps.push(at);
        if is_critical_incident(incident) {
            critical += 1;
        }
    }

    analyze(&timestamps, critical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn spaced(count: usize, hours: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| start + Duration::hours(hours * i as i64))
            .collect()
    }

    #[test]
    fn test_compound_factor_pieces() {
        assert_eq!(compound_trauma_factor(0), 1.0);
        assert_eq!(compound_trauma_factor(4), 1.0);
        assert_eq!(compound_trauma_factor(5), 1.0);
        assert!((compound_trauma_factor(6) - 1.02).abs() < 1e-9);
        assert!((compound_trauma_factor(10) - 1.10).abs() < 1e-9);
        assert!((compound_trauma_factor(11) - 1.25).abs() < 1e-9);
        assert_eq!(compound_trauma_factor(20), 2.0);
        assert_eq!(compound_trauma_factor(1000), 2.0);
    }

    proptest! {
        #[test]
        fn prop_compound_factor_bounded_and_monotone(count in 0u32..200) {
            let here = compound_trauma_factor(count);
            let next = compound_trauma_factor(count + 1);
            prop_assert!(next >= here);
            prop_assert!(here >= 1.0);
            prop_assert!(here <= MAX_COMPOUND_TRAUMA_FACTOR);
        }
    }

    #[test]
    fn test_perfect_recovery_without_pairs() {
        assert_eq!(analyze(&[], 0).recovery_score, 100.0);
        let one = analyze(&spaced(1, 0), 0);
        assert_eq!(one.recovery_score, 100.0);
        assert_eq!(one.recovery_violations, 0);
        assert!(one.min_recovery_hours.is_none());
    }

    #[test]
    fn test_violation_boundary() {
        assert_eq!(analyze(&spaced(2, 48), 0).recovery_violations, 0);
        assert_eq!(analyze(&spaced(2, 47), 0).recovery_violations, 1);
    }

    #[test]
    fn test_recovery_score_scale() {
        assert_eq!(analyze(&spaced(3, 24), 0).recovery_score, 0.0);
        assert_eq!(analyze(&spaced(3, 12), 0).recovery_score, 0.0);
        assert_eq!(analyze(&spaced(2, 168), 0).recovery_score, 100.0);
        assert_eq!(analyze(&spaced(2, 400), 0).recovery_score, 100.0);
        assert!((analyze(&spaced(2, 96), 0).recovery_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut stamps = spaced(3, 10);
        stamps.reverse();
        let analysis = analyze(&stamps, 0);
        assert_eq!(analysis.recovery_violations, 2);
        assert!((analysis.min_recovery_hours.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_six_critical_incidents_three_days_apart() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let incidents: Vec<RawEvent> = (0..6)
            .map(|i| {
                let at = start + Duration::hours(72 * i);
                RawEvent::incident(&format!("i{i}"), "alice", &at.to_rfc3339()).with_severity("critical")
            })
            .collect();

        let analysis = analyze_incidents(&incidents);
        assert_eq!(analysis.critical_incident_count, 6);
        assert!(analysis.compound_trauma_detected);
        assert!((analysis.compound_trauma_factor - 1.02).abs() < 1e-9);
        assert_eq!(analysis.recovery_violations, 0);
        assert!((analysis.min_recovery_hours.unwrap() - 72.0).abs() < 1e-9);
    }
}
