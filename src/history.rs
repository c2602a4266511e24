//! Run history
//!
//! Keeps a rolling window of tracked-metric values per entity, one value per
//! analysis run. Successive runs read it back as trend series.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::trend::{CurrentMetrics, TrackedMetric};

/// Default number of runs kept per metric
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// History of one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityHistory {
    /// Runs recorded since the store was created
    pub runs_recorded: u64,
    /// Rolling values per metric, oldest first
    series: BTreeMap<TrackedMetric, VecDeque<f64>>,
}

impl EntityHistory {
    /// Values of one metric, oldest first
    pub fn series(&self, metric: TrackedMetric) -> Vec<f64> {
        self.series
            .get(&metric)
            .map(|values| values.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All series with at least one value
    pub fn all_series(&self) -> BTreeMap<TrackedMetric, Vec<f64>> {
        self.series
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(metric, values)| (*metric, values.iter().copied().collect()))
            .collect()
    }
}

/// Rolling per-entity, per-metric history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStore {
    entities: BTreeMap<String, EntityHistory>,
    /// Maximum values kept per metric
    window_size: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl HistoryStore {
    /// Create a store keeping `window_size` runs per metric (at least one)
    pub fn new(window_size: usize) -> Self {
        Self {
            entities: BTreeMap::new(),
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Append one run's metrics. Absent or non-finite values are not recorded.
    pub fn record(&mut self, entity_id: &str, metrics: &CurrentMetrics) {
        let window = self.window_size;
        let history = self.entities.entry(entity_id.to_string()).or_default();
        history.runs_recorded += 1;

        for (metric, value) in metrics.iter() {
            if !value.is_finite() {
                continue;
            }
            let values = history
                .series
                .entry(metric)
                .or_insert_with(|| VecDeque::with_capacity(window));
            values.push_back(value);
            while values.len() > window {
                values.pop_front();
            }
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityHistory> {
        self.entities.get(entity_id)
    }

    /// Trend series for an entity; empty when unknown
    pub fn series_for(&self, entity_id: &str) -> BTreeMap<TrackedMetric, Vec<f64>> {
        self.get(entity_id)
            .map(EntityHistory::all_series)
            .unwrap_or_default()
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop one entity's history
    pub fn forget(&mut self, entity_id: &str) -> bool {
        self.entities.remove(entity_id).is_some()
    }

    /// Load a store from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let store: Self = serde_json::from_str(json)?;
        if store.window_size == 0 {
            return Err(EngineError::InvalidHistory(
                "window_size must be at least 1".to_string(),
            ));
        }
        if let Some((entity, metric)) = store.entities.iter().find_map(|(entity, history)| {
            history
                .series
                .iter()
                .find(|(_, values)| values.len() > store.window_size)
                .map(|(metric, _)| (entity.clone(), *metric))
        }) {
            return Err(EngineError::InvalidHistory(format!(
                "{entity}/{metric} holds more than {} runs",
                store.window_size
            )));
        }
        Ok(store)
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(score: f64, sentiment: Option<f64>) -> CurrentMetrics {
        CurrentMetrics {
            burnout_score: Some(score),
            sentiment,
            ..CurrentMetrics::default()
        }
    }

    #[test]
    fn test_history_accumulation() {
        let mut store = HistoryStore::default();
        store.record("alice", &run(3.0, Some(0.1)));
        store.record("alice", &run(4.0, None));

        let history = store.get("alice").unwrap();
        assert_eq!(history.runs_recorded, 2);
        assert_eq!(history.series(TrackedMetric::BurnoutScore), vec![3.0, 4.0]);
        assert_eq!(history.series(TrackedMetric::Sentiment), vec![0.1]);
        assert!(history.series(TrackedMetric::IncidentLoad).is_empty());
    }

    #[test]
    fn test_history_window_rolling() {
        let mut store = HistoryStore::new(3);
        for score in 1..=5 {
            store.record("alice", &run(score as f64, None));
        }
        assert_eq!(
            store.series_for("alice")[&TrackedMetric::BurnoutScore],
            vec![3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn test_entities_are_isolated() {
        let mut store = HistoryStore::default();
        store.record("alice", &run(3.0, None));
        store.record("bob", &run(7.0, None));

        assert_eq!(store.len(), 2);
        assert_eq!(store.entity_ids().collect::<Vec<_>>(), vec!["alice", "bob"]);
        assert!(store.forget("alice"));
        assert!(store.series_for("alice").is_empty());
        assert_eq!(store.series_for("bob")[&TrackedMetric::BurnoutScore], vec![7.0]);
    }

    #[test]
    fn test_serialization() {
        let mut store = HistoryStore::new(5);
        store.record("alice", &run(3.0, Some(-0.2)));
        store.record("alice", &run(3.5, Some(-0.3)));

        let json = store.to_json().unwrap();
        let restored = HistoryStore::from_json(&json).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.window_size(), 5);
    }

    #[test]
    fn test_rejects_invalid_payloads() {
        let zero = r#"{"entities":{},"window_size":0}"#;
        assert!(HistoryStore::from_json(zero).is_err());

        let overfull = r#"{"entities":{"alice":{"runs_recorded":3,"series":{"burnout_score":[1.0,2.0,3.0]}}},"window_size":2}"#;
        assert!(matches!(
            HistoryStore::from_json(overfull),
            Err(EngineError::InvalidHistory(_))
        ));

        assert!(matches!(
            HistoryStore::from_json("not json"),
            Err(EngineError::JsonError(_))
        ));
    }
}
