//! CBI factor extraction
//!
//! Maps period metrics and the trauma analysis onto the CBI factor set.
//! Factors without an underlying signal are left out of the map so the
//! scorer treats them as missing rather than as zero.

use crate::cbi::{CbiFactor, FactorMetrics};
use crate::metrics::PeriodMetrics;
use crate::trauma::TraumaAnalysis;

/// Incident hours per week that map to a factor value of 100
const INCIDENT_HOURS_PER_WEEK_CEILING: f64 = 20.0;

/// Assumed incident duration when resolution time is unknown
const DEFAULT_INCIDENT_HOURS: f64 = 1.0;

/// Personal burnout factors
pub fn personal_factors(period: &PeriodMetrics, trauma: &TraumaAnalysis) -> FactorMetrics {
    let mut factors = FactorMetrics::new();
    if !has_signal(period) {
        return factors;
    }
    let days = period.days_analyzed as f64;

    let incident_hours = period.total_incidents as f64
        * period.avg_resolution_hours.unwrap_or(DEFAULT_INCIDENT_HOURS);
    let incident_hours_per_week = incident_hours / days * 7.0;
    factors.insert(
        CbiFactor::WorkHoursTrend,
        incident_hours_per_week / INCIDENT_HOURS_PER_WEEK_CEILING * 100.0,
    );

    let work_events = period.total_incidents + period.total_commits;
    if work_events > 0 {
        let weekend = share(period.weekend_percentage, period.total_incidents)
            + share(period.weekend_commit_percentage, period.total_commits);
        let after_hours = share(period.after_hours_percentage, period.total_incidents)
            + share(period.after_hours_commit_percentage, period.total_commits);

        factors.insert(CbiFactor::WeekendWork, weekend / work_events as f64 * 100.0);
        factors.insert(CbiFactor::AfterHoursActivity, after_hours / work_events as f64 * 100.0);
    }

    // Share of days with any activity: no days off reads as no vacation
    factors.insert(
        CbiFactor::VacationUsage,
        period.days_with_activity as f64 / days * 100.0,
    );

    if period.total_incidents > 0 {
        let recovery_deficit = 100.0 - trauma.recovery_score;
        factors.insert(
            CbiFactor::SleepQualityProxy,
            0.5 * period.overnight_percentage + 0.5 * recovery_deficit,
        );
    }

    factors
}

/// Work-related burnout factors.
///
/// Sprint, review and deployment telemetry is not part of the event model, so
/// those factors are never emitted.
pub fn work_related_factors(period: &PeriodMetrics, trauma: &TraumaAnalysis) -> FactorMetrics {
    let mut factors = FactorMetrics::new();
    if !has_signal(period) {
        return factors;
    }

    if period.total_commits > 0 {
        factors.insert(CbiFactor::PrFrequency, period.commits_per_week);
    }
    if period.total_messages > 0 {
        factors.insert(CbiFactor::MeetingLoad, period.messages_per_day);
    }
    factors.insert(
        CbiFactor::OncallBurden,
        period.severity_weighted_per_week * trauma.compound_trauma_factor,
    );

    factors
}

/// All factors for both dimensions
pub fn factor_metrics(period: &PeriodMetrics, trauma: &TraumaAnalysis) -> FactorMetrics {
    let mut factors = personal_factors(period, trauma);
    factors.extend(work_related_factors(period, trauma));
    factors
}

fn has_signal(period: &PeriodMetrics) -> bool {
    period.days_analyzed > 0 && period.days_with_activity > 0
}

/// Reconstruct an event count from a percentage of a total
fn share(percentage: f64, total: u32) -> f64 {
    percentage / 100.0 * total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trauma;

    fn period() -> PeriodMetrics {
        PeriodMetrics {
            days_analyzed: 14,
            days_with_incidents: 4,
            days_with_activity: 7,
            total_incidents: 4,
            incidents_per_week: 2.0,
            severity_weighted_total: 60.0,
            severity_weighted_per_week: 30.0,
            after_hours_percentage: 50.0,
            weekend_percentage: 25.0,
            overnight_percentage: 50.0,
            avg_resolution_hours: Some(3.5),
            total_commits: 6,
            commits_per_week: 3.0,
            after_hours_commit_percentage: 50.0,
            weekend_commit_percentage: 0.0,
            ..PeriodMetrics::default()
        }
    }

    #[test]
    fn test_personal_factors() {
        let trauma = trauma::analyze(&[], 0);
        let factors = personal_factors(&period(), &trauma);

        // 4 incidents * 3.5h over two weeks = 7h/week
        assert!((factors[&CbiFactor::WorkHoursTrend] - 35.0).abs() < 1e-9);
        // 1 weekend incident out of 10 work events
        assert!((factors[&CbiFactor::WeekendWork] - 10.0).abs() < 1e-9);
        // 2 incidents + 3 commits after hours
        assert!((factors[&CbiFactor::AfterHoursActivity] - 50.0).abs() < 1e-9);
        assert!((factors[&CbiFactor::VacationUsage] - 50.0).abs() < 1e-9);
        // perfect recovery, half of incidents overnight
        assert!((factors[&CbiFactor::SleepQualityProxy] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_work_related_factors_omit_unknown_signals() {
        let trauma = trauma::analyze(&[], 12);
        let factors = work_related_factors(&period(), &trauma);

        assert!(!factors.contains_key(&CbiFactor::SprintCompletion));
        assert!(!factors.contains_key(&CbiFactor::CodeReviewSpeed));
        assert!(!factors.contains_key(&CbiFactor::DeploymentFrequency));
        assert!(!factors.contains_key(&CbiFactor::MeetingLoad));
        assert_eq!(factors[&CbiFactor::PrFrequency], 3.0);
        // compound factor for 12 critical incidents is 1.4
        assert!((factors[&CbiFactor::OncallBurden] - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_activity_yields_no_factors() {
        let trauma = trauma::analyze(&[], 0);
        let quiet = PeriodMetrics {
            days_analyzed: 30,
            ..PeriodMetrics::default()
        };
        assert!(factor_metrics(&quiet, &trauma).is_empty());
    }
}
