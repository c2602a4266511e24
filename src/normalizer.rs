//! Metric normalization
//!
//! Turns raw events into per-entity daily aggregates in the entity's local
//! timezone. Every calendar day of the analysis window gets an aggregate, so
//! quiet days are explicit zeros rather than gaps.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{resolve_timezone, EventKind, LocalTimeClass, RawEvent};
use crate::severity::{event_severity, SeverityWeighter};

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range; reversed bounds are swapped
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// The `days` calendar days ending at (and including) `end`, clipped at
    /// the earliest representable date
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        let start = end
            .checked_sub_signed(Duration::days(span))
            .unwrap_or(NaiveDate::MIN);
        Self::new(start, end)
    }

    /// Number of calendar days in the range
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Iterate over every day in the range
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..i64::from(self.days())).map(move |offset| start + Duration::days(offset))
    }
}

/// Activity of one entity on one local calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDailyAggregate {
    pub entity_id: String,
    pub date: NaiveDate,
    /// Incidents that started this day
    pub incident_count: u32,
    /// Sum of severity x time-impact weights
    pub severity_weighted_count: f64,
    /// Incidents outside 09:00-17:00 local
    pub after_hours_count: u32,
    /// Incidents on Saturday or Sunday
    pub weekend_count: u32,
    /// Incidents between 22:00 and 06:59 local
    pub overnight_count: u32,
    /// Critical or high severity incidents
    pub high_severity_count: u32,
    pub commit_count: u32,
    /// Commits outside 09:00-17:00 local
    pub after_hours_commit_count: u32,
    /// Commits on Saturday or Sunday
    pub weekend_commit_count: u32,
    pub message_count: u32,
    /// Whether any event landed on this day
    pub has_data: bool,
}

impl EntityDailyAggregate {
    /// A zero-valued aggregate
    pub fn empty(entity_id: &str, date: NaiveDate) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            date,
            incident_count: 0,
            severity_weighted_count: 0.0,
            after_hours_count: 0,
            weekend_count: 0,
            overnight_count: 0,
            high_severity_count: 0,
            commit_count: 0,
            after_hours_commit_count: 0,
            weekend_commit_count: 0,
            message_count: 0,
            has_data: false,
        }
    }
}

/// Normalizer for raw event streams
pub struct MetricNormalizer;

impl MetricNormalizer {
    /// Aggregate events per entity and day.
    ///
    /// Entities are discovered from the events themselves; each one gets a full
    /// window of aggregates. Output is ordered by entity id, then date.
    pub fn normalize(
        events: &[RawEvent],
        entity_timezone: &str,
        window: &DateRange,
    ) -> Vec<EntityDailyAggregate> {
        let mut by_entity: BTreeMap<&str, Vec<RawEvent>> = BTreeMap::new();
        for event in events {
            by_entity
                .entry(event.entity_id.as_str())
                .or_default()
                .push(event.clone());
        }

        by_entity
            .into_iter()
            .flat_map(|(entity_id, entity_events)| {
                Self::aggregate(entity_id, &entity_events, entity_timezone, window)
            })
            .collect()
    }

    /// Aggregate one entity's events over the window.
    ///
    /// All events are attributed to `entity_id`. Events with malformed
    /// timestamps or outside the window are skipped.
    pub fn aggregate(
        entity_id: &str,
        events: &[RawEvent],
        entity_timezone: &str,
        window: &DateRange,
    ) -> Vec<EntityDailyAggregate> {
        let tz = resolve_timezone(entity_timezone);
        let weighter = SeverityWeighter::with_tz(tz);

        let mut days: BTreeMap<NaiveDate, EntityDailyAggregate> = window
            .iter_days()
            .map(|date| (date, EntityDailyAggregate::empty(entity_id, date)))
            .collect();

        for event in events {
            let Some(at) = event.occurred_at() else {
                continue;
            };
            let class = LocalTimeClass::classify(at, &tz);
            let Some(day) = days.get_mut(&class.date) else {
                debug!(event_id = %event.id, date = %class.date, "event outside analysis window");
                continue;
            };

            day.has_data = true;
            match event.kind {
                EventKind::Incident => {
                    let severity = event_severity(event);
                    day.incident_count += 1;
                    day.severity_weighted_count += weighter.weight_at(severity, at);
                    if class.after_hours {
                        day.after_hours_count += 1;
                    }
                    if class.weekend {
                        day.weekend_count += 1;
                    }
                    if class.overnight {
                        day.overnight_count += 1;
                    }
                    if severity.is_high() {
                        day.high_severity_count += 1;
                    }
                }
                EventKind::Commit => {
                    day.commit_count += 1;
                    if class.after_hours {
                        day.after_hours_commit_count += 1;
                    }
                    if class.weekend {
                        day.weekend_commit_count += 1;
                    }
                }
                EventKind::Message => {
                    day.message_count += 1;
                }
            }
        }

        days.into_values().collect()
    }
}
