//! Raw telemetry events
//!
//! Events arrive already shaped by the per-platform collectors. The engine never
//! mutates them: it parses their timestamps, resolves the owner's timezone and
//! classifies the local time of day.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::severity::IncidentSource;

/// Business hours start (local hour, inclusive)
pub const BUSINESS_START_HOUR: u32 = 9;

/// Business hours end (local hour, exclusive)
pub const BUSINESS_END_HOUR: u32 = 17;

/// Overnight starts at this local hour (inclusive)
pub const OVERNIGHT_START_HOUR: u32 = 22;

/// Overnight ends at this local hour (inclusive)
pub const OVERNIGHT_END_HOUR: u32 = 6;

/// Earliest accepted timestamp year
pub const MIN_TIMESTAMP_YEAR: i32 = 1900;

/// Latest accepted timestamp year
pub const MAX_TIMESTAMP_YEAR: i32 = 9999;

/// Kind of telemetry event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Incident,
    Commit,
    Message,
}

/// A single incident, commit or message as delivered by a collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Collector-assigned identifier
    pub id: String,
    /// ISO-8601 timestamp, `Z` or explicit offset
    pub timestamp: String,
    /// Person the event is attributed to
    pub entity_id: String,
    /// Event kind
    pub kind: EventKind,
    /// Vendor severity or priority label (incidents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Vendor urgency flag (incidents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    /// Incident platform the severity label comes from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<IncidentSource>,
    /// Lines added (commits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<u32>,
    /// Lines deleted (commits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u32>,
    /// Sentiment in [-1, 1] (messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    /// Resolution timestamp (incidents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    /// Acknowledgement timestamp (incidents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<String>,
    /// Commit message, incident title or message body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl RawEvent {
    /// Create a bare event of the given kind
    pub fn new(kind: EventKind, id: &str, entity_id: &str, timestamp: &str) -> Self {
        Self {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            entity_id: entity_id.to_string(),
            kind,
            severity: None,
            urgency: None,
            source: None,
            additions: None,
            deletions: None,
            sentiment: None,
            resolved_at: None,
            acknowledged_at: None,
            text: None,
        }
    }

    pub fn incident(id: &str, entity_id: &str, timestamp: &str) -> Self {
        Self::new(EventKind::Incident, id, entity_id, timestamp)
    }

    pub fn commit(id: &str, entity_id: &str, timestamp: &str) -> Self {
        Self::new(EventKind::Commit, id, entity_id, timestamp)
    }

    pub fn message(id: &str, entity_id: &str, timestamp: &str) -> Self {
        Self::new(EventKind::Message, id, entity_id, timestamp)
    }

    pub fn with_severity(mut self, severity: &str) -> Self {
        self.severity = Some(severity.to_string());
        self
    }

    pub fn with_urgency(mut self, urgency: &str) -> Self {
        self.urgency = Some(urgency.to_string());
        self
    }

    pub fn with_source(mut self, source: IncidentSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_sentiment(mut self, sentiment: f64) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_acknowledged_at(mut self, timestamp: &str) -> Self {
        self.acknowledged_at = Some(timestamp.to_string());
        self
    }

    pub fn with_resolved_at(mut self, timestamp: &str) -> Self {
        self.resolved_at = Some(timestamp.to_string());
        self
    }

    /// Parse the event timestamp, logging and returning `None` when malformed
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        let parsed = parse_timestamp(&self.timestamp);
        if parsed.is_none() {
            warn!(event_id = %self.id, timestamp = %self.timestamp, "skipping event with malformed timestamp");
        }
        parsed
    }

    pub fn acknowledged_at_utc(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at.as_deref().and_then(parse_timestamp)
    }

    pub fn resolved_at_utc(&self) -> Option<DateTime<Utc>> {
        self.resolved_at.as_deref().and_then(parse_timestamp)
    }

    /// Sentiment if present and finite
    pub fn sentiment_value(&self) -> Option<f64> {
        self.sentiment.filter(|s| s.is_finite())
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or `+hh:mm`), compact offsets (`+hhmm`) and naive
/// timestamps, which are read as UTC. Instants outside years 1900-9999 are
/// rejected so window arithmetic downstream cannot overflow.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_any_timestamp(raw)
        .filter(|at| (MIN_TIMESTAMP_YEAR..=MAX_TIMESTAMP_YEAR).contains(&at.year()))
}

fn parse_any_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Resolve an IANA timezone name, falling back to UTC
pub fn resolve_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone = %name, "unknown timezone, falling back to UTC");
            Tz::UTC
        }
    }
}

/// Local time-of-day and day-of-week classification of an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTimeClass {
    /// Local calendar date
    pub date: NaiveDate,
    /// Local hour (0-23)
    pub hour: u32,
    /// Local weekday
    pub weekday: Weekday,
    /// Hour < 9 or >= 17
    pub after_hours: bool,
    /// Hour >= 22 or <= 6
    pub overnight: bool,
    /// Saturday or Sunday
    pub weekend: bool,
}

impl LocalTimeClass {
    /// Classify a UTC instant in the given timezone
    pub fn classify(at: DateTime<Utc>, tz: &Tz) -> Self {
        let local = at.with_timezone(tz);
        let hour = local.hour();
        let weekday = local.weekday();

        Self {
            date: local.date_naive(),
            hour,
            weekday,
            after_hours: is_after_hours(hour),
            overnight: is_overnight(hour),
            weekend: is_weekend(weekday),
        }
    }
}

pub fn is_after_hours(hour: u32) -> bool {
    hour < BUSINESS_START_HOUR || hour >= BUSINESS_END_HOUR
}

pub fn is_overnight(hour: u32) -> bool {
    hour >= OVERNIGHT_START_HOUR || hour <= OVERNIGHT_END_HOUR
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// An event paired with its parsed timestamp
#[derive(Debug, Clone, Copy)]
pub struct TimedEvent<'a> {
    pub at: DateTime<Utc>,
    pub event: &'a RawEvent,
}

/// Parse a stream, drop malformed timestamps and sort chronologically.
///
/// Returns the sorted events and the number of events skipped. Ties are broken
/// by event id so the order never depends on the caller.
pub fn timed_events(events: &[RawEvent]) -> (Vec<TimedEvent<'_>>, usize) {
    let mut skipped = 0;
    let mut timed: Vec<TimedEvent<'_>> = events
        .iter()
        .filter_map(|event| match event.occurred_at() {
            Some(at) => Some(TimedEvent { at, event }),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    timed.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.event.id.cmp(&b.event.id)));
    (timed, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_variants() {
        let z = parse_timestamp("2024-01-15T14:00:00Z").unwrap();
        let offset = parse_timestamp("2024-01-15T09:00:00-05:00").unwrap();
        assert_eq!(z, offset);

        let compact = parse_timestamp("2024-01-15T15:00:00+0100").unwrap();
        assert_eq!(compact, z);

        let naive = parse_timestamp("2024-01-15T14:00:00").unwrap();
        assert_eq!(naive, z);

        let fractional = parse_timestamp("2024-01-15T14:00:00.123Z").unwrap();
        assert_eq!(fractional.timestamp(), z.timestamp());
    }

    #[test]
    fn test_parse_malformed_timestamps() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45T99:00:00Z").is_none());
    }

    #[test]
    fn test_parse_rejects_out_of_range_years() {
        assert!(parse_timestamp("+262142-12-31T23:30:00").is_none());
        assert!(parse_timestamp("-0001-01-01T00:00:00").is_none());
        assert!(parse_timestamp("1899-12-31T23:59:59Z").is_none());
        assert!(parse_timestamp("1900-01-01T00:00:00Z").is_some());
        assert!(parse_timestamp("9999-12-31T00:00:00Z").is_some());
    }

    #[test]
    fn test_resolve_timezone_fallback() {
        assert_eq!(resolve_timezone("America/New_York"), Tz::America__New_York);
        assert_eq!(resolve_timezone("Not/AZone"), Tz::UTC);
        assert_eq!(resolve_timezone(""), Tz::UTC);
    }

    #[test]
    fn test_hour_thresholds() {
        assert!(is_after_hours(8));
        assert!(!is_after_hours(9));
        assert!(!is_after_hours(16));
        assert!(is_after_hours(17));

        assert!(is_overnight(22));
        assert!(!is_overnight(21));
        assert!(is_overnight(6));
        assert!(!is_overnight(7));
        assert!(is_overnight(0));
    }

    #[test]
    fn test_classify_converts_to_local_time() {
        // 2024-01-15 is a Monday. 03:00 UTC is 22:00 Sunday in New York.
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap();
        let class = LocalTimeClass::classify(at, &Tz::America__New_York);

        assert_eq!(class.hour, 22);
        assert_eq!(class.weekday, Weekday::Sun);
        assert_eq!(class.date, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert!(class.after_hours);
        assert!(class.overnight);
        assert!(class.weekend);

        let utc_class = LocalTimeClass::classify(at, &Tz::UTC);
        assert_eq!(utc_class.weekday, Weekday::Mon);
        assert!(!utc_class.weekend);
    }

    #[test]
    fn test_timed_events_sorts_and_skips() {
        let events = vec![
            RawEvent::commit("b", "alice", "2024-01-15T12:00:00Z"),
            RawEvent::commit("bad", "alice", "not-a-date"),
            RawEvent::commit("a", "alice", "2024-01-15T10:00:00Z"),
        ];

        let (timed, skipped) = timed_events(&events);
        assert_eq!(skipped, 1);
        let ids: Vec<&str> = timed.iter().map(|t| t.event.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_deserialize_with_missing_optionals() {
        let json = r#"{"id":"i1","timestamp":"2024-01-15T10:00:00Z","entity_id":"alice","kind":"incident"}"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Incident);
        assert!(event.severity.is_none());
        assert!(event.sentiment_value().is_none());
    }
}
