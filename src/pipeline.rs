//! Pipeline orchestration
//!
//! Runs one entity's streams through every stage:
//! 1. MetricNormalizer - daily aggregates in the entity's timezone
//! 2. PeriodMetrics / trauma - window-level load and recovery
//! 3. Factor mapping + CbiScorer - composite burnout score
//! 4. Trend engine - trends, prediction, timeline and early warnings
//! 5. CrossPlatformCorrelator - stress propagation between streams
//!
//! Entities are independent, so team runs fan out over a rayon pool.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cbi::{
    recommend, CbiConfig, CbiResult, CbiScorer, ConfigError, FactorMetrics, Recommendation,
};
use crate::correlation::{CorrelationResult, CrossPlatformCorrelator};
use crate::encoder::{AnalysisReport, ReportEncoder};
use crate::error::EngineError;
use crate::event::{parse_timestamp, resolve_timezone, EventKind, LocalTimeClass, RawEvent};
use crate::factors::factor_metrics;
use crate::history::{HistoryStore, DEFAULT_HISTORY_WINDOW};
use crate::metrics::PeriodMetrics;
use crate::normalizer::{DateRange, MetricNormalizer};
use crate::trauma::{self, TraumaAnalysis};
use crate::trend::{
    analyze_trends, early_warnings, predict, timeline, CriticalTimeline, CurrentMetrics,
    EarlyWarning, PredictionResult, TrackedMetric, TrendMap,
};

/// Default prediction horizon in days
pub const DEFAULT_HORIZON_DAYS: u32 = 30;

/// Default analysis window in days
pub const DEFAULT_ANALYSIS_DAYS: u32 = 30;

/// Longest accepted analysis window (about ten years)
pub const MAX_ANALYSIS_DAYS: u32 = 3660;

/// Longest accepted prediction horizon
pub const MAX_HORIZON_DAYS: u32 = 3660;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedAnalyzerConfig")]
pub struct AnalyzerConfig {
    pub cbi: CbiConfig,
    /// Days of activity per analysis window
    pub analysis_days: u32,
    /// Prediction horizon in days
    pub horizon_days: u32,
    /// Runs kept per metric by the stateful processor
    pub history_window: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cbi: CbiConfig::default(),
            analysis_days: DEFAULT_ANALYSIS_DAYS,
            horizon_days: DEFAULT_HORIZON_DAYS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct UncheckedAnalyzerConfig {
    cbi: CbiConfig,
    analysis_days: u32,
    horizon_days: u32,
    history_window: usize,
}

impl Default for UncheckedAnalyzerConfig {
    fn default() -> Self {
        let defaults = AnalyzerConfig::default();
        Self {
            cbi: defaults.cbi,
            analysis_days: defaults.analysis_days,
            horizon_days: defaults.horizon_days,
            history_window: defaults.history_window,
        }
    }
}

impl TryFrom<UncheckedAnalyzerConfig> for AnalyzerConfig {
    type Error = ConfigError;

    fn try_from(raw: UncheckedAnalyzerConfig) -> Result<Self, Self::Error> {
        let config = Self {
            cbi: raw.cbi,
            analysis_days: raw.analysis_days,
            horizon_days: raw.horizon_days,
            history_window: raw.history_window,
        };
        config.validate()?;
        Ok(config)
    }
}

impl AnalyzerConfig {
    /// Load configuration from JSON. Missing fields take their defaults; the
    /// CBI section and the day ranges are validated.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let raw: UncheckedAnalyzerConfig = serde_json::from_str(json)?;
        Ok(Self::try_from(raw)?)
    }

    /// Check the day ranges; call after changing fields in place
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_days("analysis_days", self.analysis_days, MAX_ANALYSIS_DAYS)?;
        check_days("horizon_days", self.horizon_days, MAX_HORIZON_DAYS)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One entity's raw streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInput {
    pub entity_id: String,
    /// IANA timezone; unknown names fall back to UTC
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub incidents: Vec<RawEvent>,
    #[serde(default)]
    pub commits: Vec<RawEvent>,
    #[serde(default)]
    pub messages: Vec<RawEvent>,
    /// Last day of the analysis window; defaults to the latest event's local date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

fn check_days(field: &'static str, days: u32, max: u32) -> Result<(), ConfigError> {
    if (1..=max).contains(&days) {
        Ok(())
    } else {
        Err(ConfigError::InvalidDays { field, days, max })
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl EntityInput {
    pub fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            timezone: default_timezone(),
            incidents: Vec::new(),
            commits: Vec::new(),
            messages: Vec::new(),
            as_of: None,
        }
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = timezone.to_string();
        self
    }

    pub fn with_incidents(mut self, incidents: Vec<RawEvent>) -> Self {
        self.incidents = incidents;
        self
    }

    pub fn with_commits(mut self, commits: Vec<RawEvent>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_messages(mut self, messages: Vec<RawEvent>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// All streams as one list, each event tagged with its stream's kind
    fn combined_events(&self) -> Vec<RawEvent> {
        let tagged = |events: &[RawEvent], kind: EventKind| {
            events
                .iter()
                .map(move |e| RawEvent { kind, ..e.clone() })
                .collect::<Vec<_>>()
        };
        let mut all = tagged(&self.incidents, EventKind::Incident);
        all.extend(tagged(&self.commits, EventKind::Commit));
        all.extend(tagged(&self.messages, EventKind::Message));
        all
    }

    fn streams(&self) -> impl Iterator<Item = &RawEvent> {
        self.incidents
            .iter()
            .chain(&self.commits)
            .chain(&self.messages)
    }

    fn malformed_events(&self) -> u32 {
        self.streams()
            .filter(|e| parse_timestamp(&e.timestamp).is_none())
            .count() as u32
    }

    /// Window end: explicit `as_of`, else the latest event's local date, else today
    fn window_end(&self) -> NaiveDate {
        if let Some(as_of) = self.as_of {
            return as_of;
        }
        let tz = resolve_timezone(&self.timezone);
        self.streams()
            .filter_map(|e| parse_timestamp(&e.timestamp))
            .max()
            .map(|latest| LocalTimeClass::classify(latest, &tz).date)
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Full assessment of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAssessment {
    pub entity_id: String,
    pub timezone: String,
    pub window: DateRange,
    pub period: PeriodMetrics,
    pub trauma: TraumaAnalysis,
    pub factors: FactorMetrics,
    pub cbi: CbiResult,
    pub recommendations: Vec<Recommendation>,
    pub current_metrics: CurrentMetrics,
    pub trends: TrendMap,
    pub prediction: PredictionResult,
    pub critical_timeline: BTreeMap<TrackedMetric, CriticalTimeline>,
    pub early_warnings: Vec<EarlyWarning>,
    pub correlation: CorrelationResult,
}

/// Stateless analyzer
#[derive(Debug, Clone, Default)]
pub struct BurnoutAnalyzer {
    config: AnalyzerConfig,
}

impl BurnoutAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Assess one entity with no prior runs
    pub fn analyze_entity(&self, input: &EntityInput) -> EntityAssessment {
        self.analyze_entity_with_history(input, &BTreeMap::new())
    }

    /// Assess one entity; `prior` holds earlier runs' values, oldest first.
    /// This run's values are appended before trending.
    pub fn analyze_entity_with_history(
        &self,
        input: &EntityInput,
        prior: &BTreeMap<TrackedMetric, Vec<f64>>,
    ) -> EntityAssessment {
        let days = self.config.analysis_days.clamp(1, MAX_ANALYSIS_DAYS);
        let window = DateRange::ending_at(input.window_end(), days);

        // Stage 1: daily aggregates
        let events = input.combined_events();
        let daily = MetricNormalizer::aggregate(&input.entity_id, &events, &input.timezone, &window);

        // Stage 2: period metrics and trauma, restricted to the window
        let tz = resolve_timezone(&input.timezone);
        let in_window = |events: &[RawEvent]| -> Vec<RawEvent> {
            events
                .iter()
                .filter(|e| {
                    parse_timestamp(&e.timestamp)
                        .is_some_and(|at| window.contains(LocalTimeClass::classify(at, &tz).date))
                })
                .cloned()
                .collect()
        };
        let incidents = in_window(&input.incidents);
        let commits = in_window(&input.commits);
        let messages = in_window(&input.messages);

        let mut period = PeriodMetrics::summarize(&daily, &incidents, &messages);
        period.skipped_events = input.malformed_events();
        let trauma = trauma::analyze_incidents(&incidents);

        // Stage 3: CBI
        let factors = factor_metrics(&period, &trauma);
        let cbi = CbiScorer::new(&self.config.cbi).score(&factors);
        let recommendations = recommend(&cbi);

        // Stage 4: trends over prior runs plus this one
        let current_metrics = current_metrics(&period, &cbi);
        let mut series = prior.clone();
        for (metric, value) in current_metrics.iter() {
            series.entry(metric).or_default().push(value);
        }
        let trends = analyze_trends(&series);
        let horizon_days = self.config.horizon_days.min(MAX_HORIZON_DAYS);
        let prediction = predict(&trends, &current_metrics, horizon_days);
        let critical_timeline = timeline(&trends, &current_metrics, horizon_days, window.end);
        let early_warnings = early_warnings(&trends, &current_metrics);

        // Stage 5: correlation
        let correlation =
            CrossPlatformCorrelator::with_tz(tz).correlate(&incidents, &commits, &messages);

        debug!(
            entity_id = %input.entity_id,
            composite = cbi.composite_score,
            completeness = cbi.data_completeness,
            warnings = early_warnings.len(),
            "entity assessed"
        );

        EntityAssessment {
            entity_id: input.entity_id.clone(),
            timezone: tz.name().to_string(),
            window,
            period,
            trauma,
            factors,
            cbi,
            recommendations,
            current_metrics,
            trends,
            prediction,
            critical_timeline,
            early_warnings,
            correlation,
        }
    }

    /// Assess entities in parallel, preserving input order
    pub fn analyze_team(&self, inputs: &[EntityInput]) -> Vec<EntityAssessment> {
        inputs
            .par_iter()
            .map(|input| self.analyze_entity(input))
            .collect()
    }
}

/// Values recorded into history for this run
fn current_metrics(period: &PeriodMetrics, cbi: &CbiResult) -> CurrentMetrics {
    if period.days_with_activity == 0 {
        return CurrentMetrics::default();
    }
    CurrentMetrics {
        burnout_score: (cbi.data_completeness > 0.0).then_some(cbi.composite_score / 10.0),
        incident_load: Some(period.severity_weighted_per_week),
        after_hours_percentage: (period.total_incidents > 0).then_some(period.after_hours_percentage),
        weekend_work: (period.total_incidents > 0).then_some(period.weekend_percentage),
        response_time: period.avg_response_time_minutes,
        sentiment: period.avg_sentiment,
    }
}

/// Analyze a JSON array of entity inputs and return a JSON report.
///
/// # Example
/// ```ignore
/// let report = analyze_team_json(r#"[{"entity_id": "alice", "incidents": []}]"#)?;
/// ```
pub fn analyze_team_json(inputs_json: &str) -> Result<String, EngineError> {
    let inputs: Vec<EntityInput> = serde_json::from_str(inputs_json)?;
    let assessments = BurnoutAnalyzer::default().analyze_team(&inputs);
    ReportEncoder::new().encode_to_json(assessments)
}

/// Streams for a standalone correlation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationInput {
    pub timezone: Option<String>,
    pub incidents: Vec<RawEvent>,
    pub commits: Vec<RawEvent>,
    pub messages: Vec<RawEvent>,
}

/// Correlate three JSON streams and return the JSON result
pub fn correlate_json(input_json: &str) -> Result<String, EngineError> {
    let input: CorrelationInput = serde_json::from_str(input_json)?;
    let correlator = input
        .timezone
        .as_deref()
        .map(CrossPlatformCorrelator::new)
        .unwrap_or_default();
    let result = correlator.correlate(&input.incidents, &input.commits, &input.messages);
    Ok(serde_json::to_string_pretty(&result)?)
}

/// Stateful processor that keeps run history between calls.
///
/// Use this when successive analyses of the same team should feed trends.
pub struct BurnoutProcessor {
    analyzer: BurnoutAnalyzer,
    history: HistoryStore,
    encoder: ReportEncoder,
}

impl Default for BurnoutProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BurnoutProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        let history = HistoryStore::new(config.history_window);
        Self {
            analyzer: BurnoutAnalyzer::new(config),
            history,
            encoder: ReportEncoder::new(),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Load history state from JSON
    pub fn load_history(&mut self, json: &str) -> Result<(), EngineError> {
        self.history = HistoryStore::from_json(json)?;
        Ok(())
    }

    /// Save history state to JSON
    pub fn save_history(&self) -> Result<String, EngineError> {
        self.history
            .to_json()
            .map_err(|e| EngineError::EncodingError(e.to_string()))
    }

    /// Assess a team against stored history, then record this run
    pub fn process(&mut self, inputs: &[EntityInput]) -> AnalysisReport {
        let history = &self.history;
        let analyzer = &self.analyzer;
        let assessments: Vec<EntityAssessment> = inputs
            .par_iter()
            .map(|input| {
                analyzer.analyze_entity_with_history(input, &history.series_for(&input.entity_id))
            })
            .collect();

        for assessment in &assessments {
            self.history
                .record(&assessment.entity_id, &assessment.current_metrics);
        }

        self.encoder.encode(assessments)
    }

    /// JSON in, JSON out variant of [`BurnoutProcessor::process`]
    pub fn process_json(&mut self, inputs_json: &str) -> Result<String, EngineError> {
        let inputs: Vec<EntityInput> = serde_json::from_str(inputs_json)?;
        let report = self.process(&inputs);
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
