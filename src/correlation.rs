//! Cross-platform correlation
//!
//! Looks for stress moving between incident response, code activity and
//! team communication. Every stream is parsed and sorted internally, so the
//! result does not depend on the order events are supplied in. Windows are
//! measured in absolute time; hour-of-day and weekend checks use the
//! correlator's timezone.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{resolve_timezone, timed_events, LocalTimeClass, RawEvent, TimedEvent};
use crate::metrics::mean;

/// Commit window before and after an incident
const CODE_WINDOW_HOURS: i64 = 24;
/// Commits this close before an incident are trigger candidates
const TRIGGER_WINDOW_HOURS: i64 = 2;
/// Incident window when no resolution time is known
const DEFAULT_INCIDENT_HOURS: i64 = 2;
/// Window after an incident used for the sentiment comparison
const SENTIMENT_WINDOW_HOURS: i64 = 24;
/// Window after a late-night commit used for the sentiment check
const LATE_NIGHT_SENTIMENT_HOURS: i64 = 12;
/// Window after an incident counted for cascades
const CASCADE_WINDOW_HOURS: i64 = 2;
/// Window after a negative burst in which an incident closes the cycle
const BURST_INCIDENT_WINDOW_HOURS: i64 = 48;

const HOTFIX_RATIO: f64 = 1.5;
const FAST_RESPONSE_HOURS: f64 = 2.0;
const MESSAGE_SPIKE_RATIO: f64 = 2.0;
const SENTIMENT_DROP: f64 = 0.2;
const WEEKEND_RATIO_THRESHOLD: f64 = 0.2;
const AFTER_HOURS_RATIO_THRESHOLD: f64 = 0.3;
const CASCADE_MIN_EVENTS: usize = 5;
const CASCADE_INCIDENT_SHARE: f64 = 0.3;
const URGENT_COMMIT_SHARE: f64 = 0.5;
const BURST_INCIDENT_SHARE: f64 = 0.3;
const BURST_LENGTH: usize = 3;
const AMPLIFICATION_STEP: f64 = 0.5;
const AMPLIFICATION_RISK_THRESHOLD: f64 = 1.5;
const PEAK_HOURS: usize = 3;

/// Sentiment below which a message counts as negative
pub const NEGATIVE_SENTIMENT: f64 = -0.1;

/// Commit message keywords that signal firefighting
pub const URGENCY_KEYWORDS: [&str; 5] = ["fix", "hotfix", "urgent", "asap", "emergency"];

/// Late-night commits: 22:00 to 03:59 local
pub fn is_late_night(hour: u32) -> bool {
    hour >= 22 || hour < 4
}

/// Whether the event text contains an urgency keyword (case-insensitive)
pub fn has_urgency_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    URGENCY_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    #[default]
    InsufficientData,
    Analyzed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    IncidentCode,
    Communication,
    Temporal,
    StressPropagation,
}

/// Detected correlation pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationPattern {
    HotfixPattern,
    TriggerCommits,
    FastResponse,
    MessageSpike,
    SentimentDrop,
    WeekendCorrelation,
    AfterHoursCorrelation,
    CascadePattern,
    IncidentToCodeStress,
    CodeToCommunicationStress,
    CommunicationToIncidentCycle,
    StressAmplification,
}

impl CorrelationPattern {
    /// Points this pattern adds to the correlation risk score
    pub fn risk_points(self) -> f64 {
        match self {
            CorrelationPattern::HotfixPattern => 20.0,
            CorrelationPattern::TriggerCommits => 15.0,
            CorrelationPattern::FastResponse => 10.0,
            CorrelationPattern::MessageSpike => 15.0,
            CorrelationPattern::SentimentDrop => 20.0,
            CorrelationPattern::WeekendCorrelation => 25.0,
            CorrelationPattern::AfterHoursCorrelation => 20.0,
            CorrelationPattern::CascadePattern => 15.0,
            CorrelationPattern::IncidentToCodeStress => 15.0,
            CorrelationPattern::CodeToCommunicationStress => 20.0,
            CorrelationPattern::CommunicationToIncidentCycle => 25.0,
            CorrelationPattern::StressAmplification => 30.0,
        }
    }

    pub fn category(self) -> PatternCategory {
        match self {
            CorrelationPattern::HotfixPattern
            | CorrelationPattern::TriggerCommits
            | CorrelationPattern::FastResponse => PatternCategory::IncidentCode,
            CorrelationPattern::MessageSpike | CorrelationPattern::SentimentDrop => {
                PatternCategory::Communication
            }
            CorrelationPattern::WeekendCorrelation
            | CorrelationPattern::AfterHoursCorrelation
            | CorrelationPattern::CascadePattern => PatternCategory::Temporal,
            CorrelationPattern::IncidentToCodeStress
            | CorrelationPattern::CodeToCommunicationStress
            | CorrelationPattern::CommunicationToIncidentCycle
            | CorrelationPattern::StressAmplification => PatternCategory::StressPropagation,
        }
    }
}

/// Structured finding behind the risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationInsight {
    pub pattern: CorrelationPattern,
    pub category: PatternCategory,
    pub risk_points: f64,
    /// Ratio, share or count that triggered the pattern
    pub evidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentCodeCorrelation {
    pub incidents_analyzed: u32,
    /// Commits in the 24h before incidents
    pub commits_before_incidents: u32,
    /// Commits in the 24h after incidents
    pub commits_after_incidents: u32,
    /// Incidents with a commit in the preceding 2h
    pub incidents_with_trigger_commits: u32,
    pub hotfix_pattern: bool,
    pub trigger_commit_pattern: bool,
    /// Mean hours from incident to the first commit within 24h
    pub avg_time_to_fix_hours: Option<f64>,
    pub fast_response: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationPatterns {
    pub messages_during_incidents: u32,
    pub messages_outside_incidents: u32,
    /// Messages per hour inside incident windows
    pub during_incident_rate: f64,
    /// Messages per hour outside incident windows
    pub outside_incident_rate: f64,
    pub message_spike: bool,
    pub sentiment_during_incidents: Option<f64>,
    pub sentiment_after_incidents: Option<f64>,
    pub sentiment_drop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourStress {
    /// Local hour (0-23)
    pub hour: u32,
    pub stress_score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalCorrelations {
    pub total_events: u32,
    pub weekend_ratio: f64,
    pub after_hours_ratio: f64,
    pub weekend_incidents: u32,
    pub after_hours_incidents: u32,
    pub weekend_correlation: bool,
    pub after_hours_correlation: bool,
    /// Up to three hours with the highest stress score
    pub peak_stress_hours: Vec<HourStress>,
    /// Incidents followed by five or more events within 2h
    pub cascading_incidents: u32,
    pub cascade_pattern: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressPropagation {
    pub post_incident_commits: u32,
    pub urgent_post_incident_commits: u32,
    pub incident_to_code_stress: bool,
    pub late_night_commits: u32,
    pub sentiment_after_late_night_commits: Option<f64>,
    pub code_to_communication_stress: bool,
    pub negative_bursts: u32,
    pub bursts_followed_by_incident: u32,
    pub communication_to_incident_cycle: bool,
    /// `1 + 0.5 x` the number of propagation paths detected
    pub stress_amplification_factor: f64,
}

impl Default for StressPropagation {
    fn default() -> Self {
        Self {
            post_incident_commits: 0,
            urgent_post_incident_commits: 0,
            incident_to_code_stress: false,
            late_night_commits: 0,
            sentiment_after_late_night_commits: None,
            code_to_communication_stress: false,
            negative_bursts: 0,
            bursts_followed_by_incident: 0,
            communication_to_incident_cycle: false,
            stress_amplification_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub status: CorrelationStatus,
    pub events_analyzed: u32,
    /// Events dropped for malformed timestamps
    pub skipped_events: u32,
    pub incident_code_correlation: IncidentCodeCorrelation,
    pub communication_patterns: CommunicationPatterns,
    pub temporal_correlations: TemporalCorrelations,
    pub stress_propagation: StressPropagation,
    pub insights: Vec<CorrelationInsight>,
    /// 0-100
    pub risk_score: f64,
}

/// Correlator bound to one timezone
#[derive(Debug, Clone, Copy)]
pub struct CrossPlatformCorrelator {
    tz: Tz,
}

impl Default for CrossPlatformCorrelator {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl CrossPlatformCorrelator {
    pub fn new(timezone: &str) -> Self {
        Self {
            tz: resolve_timezone(timezone),
        }
    }

    pub fn with_tz(tz: Tz) -> Self {
        Self { tz }
    }

    /// Correlate the three streams of one entity (or team)
    pub fn correlate(
        &self,
        incidents: &[RawEvent],
        code_events: &[RawEvent],
        comms_events: &[RawEvent],
    ) -> CorrelationResult {
        let (incidents, skipped_incidents) = timed_events(incidents);
        let (commits, skipped_commits) = timed_events(code_events);
        let (messages, skipped_messages) = timed_events(comms_events);

        let skipped_events = (skipped_incidents + skipped_commits + skipped_messages) as u32;
        let events_analyzed = (incidents.len() + commits.len() + messages.len()) as u32;

        if events_analyzed == 0 {
            return CorrelationResult {
                skipped_events,
                ..CorrelationResult::default()
            };
        }

        let streams = Streams {
            incidents: &incidents,
            commits: &commits,
            messages: &messages,
            tz: self.tz,
        };

        let incident_code_correlation = streams.incident_code();
        let communication_patterns = streams.communication();
        let temporal_correlations = streams.temporal();
        let stress_propagation = streams.propagation();

        let insights = insights(
            &incident_code_correlation,
            &communication_patterns,
            &temporal_correlations,
            &stress_propagation,
        );
        let risk_score = insights.iter().map(|i| i.risk_points).sum::<f64>().min(100.0);

        debug!(
            events = events_analyzed,
            patterns = insights.len(),
            risk_score,
            "cross-platform correlation"
        );

        CorrelationResult {
            status: CorrelationStatus::Analyzed,
            events_analyzed,
            skipped_events,
            incident_code_correlation,
            communication_patterns,
            temporal_correlations,
            stress_propagation,
            insights,
            risk_score,
        }
    }
}

/// Correlate in UTC
pub fn correlate(
    incidents: &[RawEvent],
    code_events: &[RawEvent],
    comms_events: &[RawEvent],
) -> CorrelationResult {
    CrossPlatformCorrelator::default().correlate(incidents, code_events, comms_events)
}

/// Sorted, parsed streams
struct Streams<'s, 'a> {
    incidents: &'s [TimedEvent<'a>],
    commits: &'s [TimedEvent<'a>],
    messages: &'s [TimedEvent<'a>],
    tz: Tz,
}

impl<'s, 'a> Streams<'s, 'a> {
    fn incident_code(&self) -> IncidentCodeCorrelation {
        let mut before = 0;
        let mut after = 0;
        let mut with_trigger = 0;
        let mut fix_hours = Vec::new();

        for incident in self.incidents {
            let t = incident.at;
            before += in_range(self.commits, t - hours(CODE_WINDOW_HOURS), t).len() as u32;
            let following = after_range(self.commits, t, t + hours(CODE_WINDOW_HOURS));
            after += following.len() as u32;

            if !in_range(self.commits, t - hours(TRIGGER_WINDOW_HOURS), t).is_empty() {
                with_trigger += 1;
            }
            if let Some(first) = following.first() {
                fix_hours.push(elapsed_hours(t, first.at));
            }
        }

        let incidents = self.incidents.len() as u32;
        let avg_time_to_fix_hours = mean(&fix_hours);

        IncidentCodeCorrelation {
            incidents_analyzed: incidents,
            commits_before_incidents: before,
            commits_after_incidents: after,
            incidents_with_trigger_commits: with_trigger,
            hotfix_pattern: after > 0 && after as f64 > before as f64 * HOTFIX_RATIO,
            trigger_commit_pattern: with_trigger > 0 && with_trigger * 2 >= incidents,
            avg_time_to_fix_hours,
            fast_response: avg_time_to_fix_hours.is_some_and(|h| h < FAST_RESPONSE_HOURS),
        }
    }

    /// Incident windows merged into disjoint intervals
    fn incident_windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = self
            .incidents
            .iter()
            .map(|i| (i.at, incident_end(i)))
            .collect();
        windows.sort();

        let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(windows.len());
        for (start, end) in windows {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    fn communication(&self) -> CommunicationPatterns {
        if self.messages.is_empty() {
            return CommunicationPatterns::default();
        }

        let windows = self.incident_windows();
        let inside = |at: DateTime<Utc>| windows.iter().any(|(s, e)| at >= *s && at <= *e);

        let (during, outside): (Vec<&TimedEvent<'a>>, Vec<&TimedEvent<'a>>) =
            self.messages.iter().partition(|m| inside(m.at));

        let incident_hours: f64 = windows.iter().map(|(s, e)| elapsed_hours(*s, *e)).sum();
        let outside_hours = (self.span_hours() - incident_hours).max(0.0);

        let during_incident_rate = rate(during.len(), incident_hours);
        let outside_incident_rate = rate(outside.len(), outside_hours);

        let during_sentiment: Vec<f64> =
            during.iter().filter_map(|m| m.event.sentiment_value()).collect();

        let mut after_ids = BTreeSet::new();
        for (_, end) in &windows {
            for m in after_range(self.messages, *end, *end + hours(SENTIMENT_WINDOW_HOURS)) {
                if !inside(m.at) {
                    after_ids.insert(message_key(m));
                }
            }
        }
        let after_sentiment: Vec<f64> = self
            .messages
            .iter()
            .filter(|m| after_ids.contains(&message_key(m)))
            .filter_map(|m| m.event.sentiment_value())
            .collect();

        let sentiment_during_incidents = mean(&during_sentiment);
        let sentiment_after_incidents = mean(&after_sentiment);

        CommunicationPatterns {
            messages_during_incidents: during.len() as u32,
            messages_outside_incidents: outside.len() as u32,
            during_incident_rate,
            outside_incident_rate,
            message_spike: !during.is_empty()
                && during_incident_rate > MESSAGE_SPIKE_RATIO * outside_incident_rate,
            sentiment_during_incidents,
            sentiment_after_incidents,
            sentiment_drop: match (sentiment_during_incidents, sentiment_after_incidents) {
                (Some(d), Some(a)) => d - a >= SENTIMENT_DROP,
                _ => false,
            },
        }
    }

    /// Hours between the first and last event across all streams
    fn span_hours(&self) -> f64 {
        let all = [self.incidents, self.commits, self.messages];
        let first = all.iter().filter_map(|s| s.first()).map(|e| e.at).min();
        let last = all.iter().filter_map(|s| s.last()).map(|e| e.at).max();
        match (first, last) {
            (Some(first), Some(last)) => elapsed_hours(first, last),
            _ => 0.0,
        }
    }

    fn temporal(&self) -> TemporalCorrelations {
        let mut total = 0u32;
        let mut weekend = 0u32;
        let mut after_hours = 0u32;
        let mut weekend_incidents = 0u32;
        let mut after_hours_incidents = 0u32;
        let mut stress = [0u32; 24];

        for incident in self.incidents {
            let class = LocalTimeClass::classify(incident.at, &self.tz);
            total += 1;
            if class.weekend {
                weekend += 1;
                weekend_incidents += 1;
            }
            if class.after_hours {
                after_hours += 1;
                after_hours_incidents += 1;
            }
            stress[class.hour as usize] += 3;
        }
        for commit in self.commits {
            let class = LocalTimeClass::classify(commit.at, &self.tz);
            total += 1;
            weekend += u32::from(class.weekend);
            after_hours += u32::from(class.after_hours);
            if is_late_night(class.hour) {
                stress[class.hour as usize] += 2;
            }
        }
        for message in self.messages {
            let class = LocalTimeClass::classify(message.at, &self.tz);
            total += 1;
            weekend += u32::from(class.weekend);
            after_hours += u32::from(class.after_hours);
            if is_negative(message) {
                stress[class.hour as usize] += 1;
            }
        }

        let weekend_ratio = ratio(weekend, total);
        let after_hours_ratio = ratio(after_hours, total);

        let mut peak_stress_hours: Vec<HourStress> = stress
            .iter()
            .enumerate()
            .filter(|(_, score)| **score > 0)
            .map(|(hour, score)| HourStress {
                hour: hour as u32,
                stress_score: *score,
            })
            .collect();
        peak_stress_hours.sort_by(|a, b| b.stress_score.cmp(&a.stress_score).then(a.hour.cmp(&b.hour)));
        peak_stress_hours.truncate(PEAK_HOURS);

        let cascading_incidents = self
            .incidents
            .iter()
            .filter(|i| {
                let end = i.at + hours(CASCADE_WINDOW_HOURS);
                after_range(self.commits, i.at, end).len() + after_range(self.messages, i.at, end).len()
                    >= CASCADE_MIN_EVENTS
            })
            .count() as u32;
        let incident_count = self.incidents.len() as u32;

        TemporalCorrelations {
            total_events: total,
            weekend_ratio,
            after_hours_ratio,
            weekend_incidents,
            after_hours_incidents,
            weekend_correlation: weekend_ratio > WEEKEND_RATIO_THRESHOLD && weekend_incidents > 0,
            after_hours_correlation: after_hours_ratio > AFTER_HOURS_RATIO_THRESHOLD
                && after_hours_incidents > 0,
            peak_stress_hours,
            cascading_incidents,
            cascade_pattern: incident_count > 0
                && ratio(cascading_incidents, incident_count) >= CASCADE_INCIDENT_SHARE,
        }
    }

    fn propagation(&self) -> StressPropagation {
        // incident -> code: urgency wording in commits following incidents
        let mut post_incident = BTreeSet::new();
        for incident in self.incidents {
            for commit in after_range(self.commits, incident.at, incident.at + hours(CODE_WINDOW_HOURS)) {
                post_incident.insert(message_key(commit));
            }
        }
        let urgent = self
            .commits
            .iter()
            .filter(|c| post_incident.contains(&message_key(c)))
            .filter(|c| c.event.text.as_deref().is_some_and(has_urgency_keyword))
            .count() as u32;
        let post_incident_commits = post_incident.len() as u32;
        let incident_to_code_stress = post_incident_commits > 0
            && ratio(urgent, post_incident_commits) > URGENT_COMMIT_SHARE;

        // code -> communication: mood after late-night commits
        let late_night: Vec<&TimedEvent<'a>> = self
            .commits
            .iter()
            .filter(|c| is_late_night(LocalTimeClass::classify(c.at, &self.tz).hour))
            .collect();
        let mut after_late_night = BTreeSet::new();
        for commit in &late_night {
            for m in after_range(self.messages, commit.at, commit.at + hours(LATE_NIGHT_SENTIMENT_HOURS)) {
                after_late_night.insert(message_key(m));
            }
        }
        let late_night_sentiment: Vec<f64> = self
            .messages
            .iter()
            .filter(|m| after_late_night.contains(&message_key(m)))
            .filter_map(|m| m.event.sentiment_value())
            .collect();
        let sentiment_after_late_night_commits = mean(&late_night_sentiment);
        let code_to_communication_stress =
            sentiment_after_late_night_commits.is_some_and(|s| s < NEGATIVE_SENTIMENT);

        // communication -> incident: negative bursts followed by incidents
        let bursts = negative_burst_ends(self.messages);
        let followed = bursts
            .iter()
            .filter(|end| {
                !after_range(self.incidents, **end, **end + hours(BURST_INCIDENT_WINDOW_HOURS))
                    .is_empty()
            })
            .count() as u32;
        let negative_bursts = bursts.len() as u32;
        let communication_to_incident_cycle =
            negative_bursts > 0 && ratio(followed, negative_bursts) > BURST_INCIDENT_SHARE;

        let paths = [
            incident_to_code_stress,
            code_to_communication_stress,
            communication_to_incident_cycle,
        ]
        .iter()
        .filter(|p| **p)
        .count();

        StressPropagation {
            post_incident_commits,
            urgent_post_incident_commits: urgent,
            incident_to_code_stress,
            late_night_commits: late_night.len() as u32,
            sentiment_after_late_night_commits,
            code_to_communication_stress,
            negative_bursts,
            bursts_followed_by_incident: followed,
            communication_to_incident_cycle,
            stress_amplification_factor: 1.0 + AMPLIFICATION_STEP * paths as f64,
        }
    }
}

fn insights(
    code: &IncidentCodeCorrelation,
    comms: &CommunicationPatterns,
    temporal: &TemporalCorrelations,
    propagation: &StressPropagation,
) -> Vec<CorrelationInsight> {
    let detected = [
        (
            code.hotfix_pattern,
            CorrelationPattern::HotfixPattern,
            code.commits_after_incidents as f64,
        ),
        (
            code.trigger_commit_pattern,
            CorrelationPattern::TriggerCommits,
            code.incidents_with_trigger_commits as f64,
        ),
        (
            code.fast_response,
            CorrelationPattern::FastResponse,
            code.avg_time_to_fix_hours.unwrap_or(0.0),
        ),
        (
            comms.message_spike,
            CorrelationPattern::MessageSpike,
            comms.during_incident_rate,
        ),
        (
            comms.sentiment_drop,
            CorrelationPattern::SentimentDrop,
            match (comms.sentiment_during_incidents, comms.sentiment_after_incidents) {
                (Some(d), Some(a)) => d - a,
                _ => 0.0,
            },
        ),
        (
            temporal.weekend_correlation,
            CorrelationPattern::WeekendCorrelation,
            temporal.weekend_ratio,
        ),
        (
            temporal.after_hours_correlation,
            CorrelationPattern::AfterHoursCorrelation,
            temporal.after_hours_ratio,
        ),
        (
            temporal.cascade_pattern,
            CorrelationPattern::CascadePattern,
            temporal.cascading_incidents as f64,
        ),
        (
            propagation.incident_to_code_stress,
            CorrelationPattern::IncidentToCodeStress,
            propagation.urgent_post_incident_commits as f64,
        ),
        (
            propagation.code_to_communication_stress,
            CorrelationPattern::CodeToCommunicationStress,
            propagation.sentiment_after_late_night_commits.unwrap_or(0.0),
        ),
        (
            propagation.communication_to_incident_cycle,
            CorrelationPattern::CommunicationToIncidentCycle,
            propagation.bursts_followed_by_incident as f64,
        ),
        (
            propagation.stress_amplification_factor > AMPLIFICATION_RISK_THRESHOLD,
            CorrelationPattern::StressAmplification,
            propagation.stress_amplification_factor,
        ),
    ];

    detected
        .into_iter()
        .filter(|(hit, _, _)| *hit)
        .map(|(_, pattern, evidence)| CorrelationInsight {
            pattern,
            category: pattern.category(),
            risk_points: pattern.risk_points(),
            evidence,
        })
        .collect()
}

/// End times of non-overlapping runs of three consecutive negative messages
fn negative_burst_ends(messages: &[TimedEvent<'_>]) -> Vec<DateTime<Utc>> {
    let mut ends = Vec::new();
    let mut run = 0;
    for message in messages {
        if is_negative(message) {
            run += 1;
            if run == BURST_LENGTH {
                ends.push(message.at);
                run = 0;
            }
        } else {
            run = 0;
        }
    }
    ends
}

fn is_negative(message: &TimedEvent<'_>) -> bool {
    message
        .event
        .sentiment_value()
        .is_some_and(|s| s < NEGATIVE_SENTIMENT)
}

fn incident_end(incident: &TimedEvent<'_>) -> DateTime<Utc> {
    incident
        .event
        .resolved_at_utc()
        .filter(|end| *end >= incident.at)
        .unwrap_or(incident.at + hours(DEFAULT_INCIDENT_HOURS))
}

/// Events in `[start, end)`
fn in_range<'s, 'a>(
    events: &'s [TimedEvent<'a>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> &'s [TimedEvent<'a>] {
    let lo = events.partition_point(|e| e.at < start);
    let hi = events.partition_point(|e| e.at < end);
    &events[lo..hi.max(lo)]
}

/// Events in `(start, end]`
fn after_range<'s, 'a>(
    events: &'s [TimedEvent<'a>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> &'s [TimedEvent<'a>] {
    let lo = events.partition_point(|e| e.at <= start);
    let hi = events.partition_point(|e| e.at <= end);
    &events[lo..hi.max(lo)]
}

/// Stable identity of an event within a sorted stream
fn message_key(event: &TimedEvent<'_>) -> (DateTime<Utc>, String) {
    (event.at, event.event.id.clone())
}

fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

fn rate(count: usize, hours: f64) -> f64 {
    if hours > 0.0 {
        count as f64 / hours
    } else {
        0.0
    }
}

fn ratio(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
