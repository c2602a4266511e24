//! Severity and time-impact weighting
//!
//! Vendor labels (`SEV0`..`SEV4`, `P1`..`P5`, urgency flags) are first mapped to
//! a [`VendorSeverity`], then onto the canonical five-point [`Severity`] scale.
//! The canonical scale alone carries the weighting table.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::event::{resolve_timezone, LocalTimeClass, RawEvent};

/// Canonical, platform-agnostic severity (most critical first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Base stress weight for an incident of this severity
    pub fn base_weight(self) -> f64 {
        match self {
            Severity::Critical => 15.0,
            Severity::High => 12.0,
            Severity::Medium => 6.0,
            Severity::Low => 3.0,
            Severity::Info => 1.5,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// Incident platform a severity label originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSource {
    /// SEV0..SEV4 taxonomy with a single critical tier
    Rootly,
    /// P1..P5 priorities plus high/low urgency
    PagerDuty,
    #[default]
    Generic,
}

impl IncidentSource {
    /// Whether an incident of this severity counts towards compound trauma.
    ///
    /// PagerDuty's five priority levels put real emergencies in both P1 and P2,
    /// so both count; other sources only count their top tier.
    pub fn is_critical(self, severity: Severity) -> bool {
        match self {
            IncidentSource::PagerDuty => severity.is_high(),
            IncidentSource::Rootly | IncidentSource::Generic => severity == Severity::Critical,
        }
    }
}

/// Vendor urgency flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Low,
}

/// A severity label as understood from a vendor payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorSeverity {
    /// `SEVn`, 0 is most severe
    Sev(u8),
    /// `Pn`, 1 is most severe
    Priority(u8),
    /// Plain level name such as "critical" or "minor"
    Named(Severity),
    Urgency(Urgency),
    Unmapped,
}

impl VendorSeverity {
    /// Interpret an incident's severity label and urgency flag.
    ///
    /// An explicit severity or priority always wins over the urgency flag.
    pub fn from_labels(severity: Option<&str>, urgency: Option<&str>) -> Self {
        let explicit = severity.map(Self::parse_label).unwrap_or(VendorSeverity::Unmapped);
        if explicit != VendorSeverity::Unmapped {
            return explicit;
        }

        urgency
            .and_then(parse_urgency)
            .map(VendorSeverity::Urgency)
            .unwrap_or(VendorSeverity::Unmapped)
    }

    /// Interpret a single label
    pub fn parse_label(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for (i, token) in tokens.iter().enumerate() {
            if let Some(rest) = token.strip_prefix("sev") {
                if let Ok(level) = rest.parse::<u8>() {
                    return VendorSeverity::Sev(level);
                }
                // "sev 1", "sev-1"
                if rest.is_empty() {
                    if let Some(level) = tokens.get(i + 1).and_then(|n| n.parse::<u8>().ok()) {
                        return VendorSeverity::Sev(level);
                    }
                }
            }
        }

        for token in &tokens {
            if let Some(rest) = token.strip_prefix('p') {
                if let Ok(level) = rest.parse::<u8>() {
                    return VendorSeverity::Priority(level);
                }
            }
        }

        if tokens.first() == Some(&"urgency") {
            return tokens
                .get(1)
                .and_then(|t| parse_urgency(t))
                .map(VendorSeverity::Urgency)
                .unwrap_or(VendorSeverity::Unmapped);
        }

        for token in &tokens {
            let named = match *token {
                "critical" | "crit" | "fatal" | "emergency" => Some(Severity::Critical),
                "high" | "major" | "error" => Some(Severity::High),
                "medium" | "moderate" | "warning" | "warn" => Some(Severity::Medium),
                "low" | "minor" => Some(Severity::Low),
                "info" | "informational" => Some(Severity::Info),
                _ => None,
            };
            if let Some(severity) = named {
                return VendorSeverity::Named(severity);
            }
        }

        VendorSeverity::Unmapped
    }

    /// Map onto the canonical scale
    pub fn canonical(self) -> Severity {
        match self {
            VendorSeverity::Sev(0) => Severity::Critical,
            VendorSeverity::Sev(1) => Severity::High,
            VendorSeverity::Sev(2) => Severity::Medium,
            VendorSeverity::Sev(3) => Severity::Low,
            VendorSeverity::Sev(_) => Severity::Info,
            VendorSeverity::Priority(0) | VendorSeverity::Priority(1) => Severity::Critical,
            VendorSeverity::Priority(2) => Severity::High,
            VendorSeverity::Priority(3) => Severity::Medium,
            VendorSeverity::Priority(4) => Severity::Low,
            VendorSeverity::Priority(_) => Severity::Info,
            VendorSeverity::Named(severity) => severity,
            VendorSeverity::Urgency(Urgency::High) => Severity::High,
            VendorSeverity::Urgency(Urgency::Low) => Severity::Low,
            VendorSeverity::Unmapped => Severity::Info,
        }
    }
}

fn parse_urgency(label: &str) -> Option<Urgency> {
    let lower = label.trim().to_ascii_lowercase();
    let value = lower.strip_prefix("urgency").unwrap_or(&lower);
    match value.trim_start_matches([':', '=', ' ']).trim() {
        "high" => Some(Urgency::High),
        "low" => Some(Urgency::Low),
        _ => None,
    }
}

/// Canonical severity of an event
pub fn event_severity(event: &RawEvent) -> Severity {
    VendorSeverity::from_labels(event.severity.as_deref(), event.urgency.as_deref()).canonical()
}

/// Whether an incident counts as critical for its source
pub fn is_critical_incident(event: &RawEvent) -> bool {
    event.source.unwrap_or_default().is_critical(event_severity(event))
}

/// Time-of-day / day-of-week impact category.
///
/// At most one category applies: overnight, then weekend, then after-hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeImpact {
    BusinessHours,
    AfterHours,
    Weekend,
    Overnight,
}

impl TimeImpact {
    pub fn from_class(class: &LocalTimeClass) -> Self {
        if class.overnight {
            TimeImpact::Overnight
        } else if class.weekend {
            TimeImpact::Weekend
        } else if class.after_hours {
            TimeImpact::AfterHours
        } else {
            TimeImpact::BusinessHours
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            TimeImpact::BusinessHours => 1.0,
            TimeImpact::AfterHours => 1.4,
            TimeImpact::Weekend => 1.6,
            TimeImpact::Overnight => 1.8,
        }
    }
}

/// Weights incidents by severity and local time of occurrence
#[derive(Debug, Clone)]
pub struct SeverityWeighter {
    tz: Tz,
}

impl Default for SeverityWeighter {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl SeverityWeighter {
    /// Create a weighter for an entity's IANA timezone (unknown zones fall back to UTC)
    pub fn new(timezone: &str) -> Self {
        Self {
            tz: resolve_timezone(timezone),
        }
    }

    pub fn with_tz(tz: Tz) -> Self {
        Self { tz }
    }

    /// Severity weight times time-impact multiplier.
    ///
    /// An unparseable timestamp keeps the bare severity weight.
    pub fn weight(&self, event: &RawEvent) -> f64 {
        let severity = event_severity(event);
        match event.occurred_at() {
            Some(at) => self.weight_at(severity, at),
            None => severity.base_weight(),
        }
    }

    pub fn weight_at(&self, severity: Severity, at: DateTime<Utc>) -> f64 {
        let class = LocalTimeClass::classify(at, &self.tz);
        severity.base_weight() * TimeImpact::from_class(&class).multiplier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_vendor_labels() {
        assert_eq!(VendorSeverity::parse_label("SEV0"), VendorSeverity::Sev(0));
        assert_eq!(VendorSeverity::parse_label("sev-2"), VendorSeverity::Sev(2));
        assert_eq!(VendorSeverity::parse_label("Sev 1 - Major"), VendorSeverity::Sev(1));
        assert_eq!(VendorSeverity::parse_label("P1"), VendorSeverity::Priority(1));
        assert_eq!(
            VendorSeverity::parse_label("Critical"),
            VendorSeverity::Named(Severity::Critical)
        );
        assert_eq!(
            VendorSeverity::parse_label("urgency: low"),
            VendorSeverity::Urgency(Urgency::Low)
        );
        assert_eq!(VendorSeverity::parse_label("banana"), VendorSeverity::Unmapped);
    }

    #[test]
    fn test_canonical_mapping() {
        assert_eq!(VendorSeverity::Sev(0).canonical(), Severity::Critical);
        assert_eq!(VendorSeverity::Sev(4).canonical(), Severity::Info);
        assert_eq!(VendorSeverity::Priority(1).canonical(), Severity::Critical);
        assert_eq!(VendorSeverity::Priority(2).canonical(), Severity::High);
        assert_eq!(VendorSeverity::Priority(5).canonical(), Severity::Info);
        assert_eq!(VendorSeverity::Urgency(Urgency::High).canonical(), Severity::High);
        assert_eq!(VendorSeverity::Unmapped.canonical(), Severity::Info);
    }

    #[test]
    fn test_explicit_severity_beats_urgency() {
        let v = VendorSeverity::from_labels(Some("P4"), Some("high"));
        assert_eq!(v.canonical(), Severity::Low);

        let v = VendorSeverity::from_labels(None, Some("high"));
        assert_eq!(v.canonical(), Severity::High);

        let v = VendorSeverity::from_labels(Some("unknown"), Some("low"));
        assert_eq!(v.canonical(), Severity::Low);

        let v = VendorSeverity::from_labels(None, None);
        assert_eq!(v.canonical(), Severity::Info);
    }

    #[test]
    fn test_critical_tier_per_source() {
        assert!(IncidentSource::PagerDuty.is_critical(Severity::High));
        assert!(IncidentSource::PagerDuty.is_critical(Severity::Critical));
        assert!(!IncidentSource::Rootly.is_critical(Severity::High));
        assert!(IncidentSource::Rootly.is_critical(Severity::Critical));
        assert!(!IncidentSource::Generic.is_critical(Severity::Medium));
    }

    #[test]
    fn test_time_impact_precedence() {
        let weighter = SeverityWeighter::default();

        // Monday 12:00 UTC: business hours
        let business = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(weighter.weight_at(Severity::Medium, business), 6.0);

        // Monday 18:00: after hours only
        let evening = Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap();
        assert!((weighter.weight_at(Severity::Medium, evening) - 6.0 * 1.4).abs() < 1e-9);

        // Saturday 12:00: weekend
        let saturday = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
        assert!((weighter.weight_at(Severity::Medium, saturday) - 6.0 * 1.6).abs() < 1e-9);

        // Saturday 23:00: overnight wins over weekend
        let saturday_night = Utc.with_ymd_and_hms(2024, 1, 20, 23, 0, 0).unwrap();
        assert!((weighter.weight_at(Severity::Medium, saturday_night) - 6.0 * 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_weight_uses_entity_timezone() {
        let weighter = SeverityWeighter::new("Asia/Tokyo");
        // 03:00 UTC Monday = 12:00 Monday in Tokyo
        let event = RawEvent::incident("i1", "alice", "2024-01-15T03:00:00Z").with_severity("critical");
        assert_eq!(weighter.weight(&event), 15.0);

        let utc = SeverityWeighter::new("UTC");
        assert!((utc.weight(&event) - 15.0 * 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_timestamp_keeps_base_weight() {
        let weighter = SeverityWeighter::default();
        let event = RawEvent::incident("i1", "alice", "garbage").with_severity("sev1");
        assert_eq!(weighter.weight(&event), 12.0);
    }
}
