//! Burnout Engine - Deterministic burnout risk scoring and prediction
//!
//! The engine turns on-call incidents, commits and chat messages into a
//! per-person burnout assessment through a deterministic pipeline:
//! event normalization → severity weighting → trauma analysis → CBI scoring
//! → trend prediction → cross-platform correlation → report encoding.
//!
//! ## Modules
//!
//! - **Scoring**: Copenhagen Burnout Inventory dimensions and composite score
//! - **Prediction**: Trend analysis, risk trajectory and critical timeline
//! - **Correlation**: Incident, code and communication patterns

pub mod cbi;
pub mod correlation;
pub mod encoder;
pub mod error;
pub mod event;
pub mod factors;
pub mod history;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod severity;
pub mod trauma;
pub mod trend;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use cbi::{CbiConfig, CbiFactor, CbiResult, CbiScorer, Dimension, Interpretation};
pub use correlation::{correlate, CorrelationResult, CrossPlatformCorrelator};
pub use encoder::{AnalysisReport, ReportEncoder};
pub use error::EngineError;
pub use event::{EventKind, RawEvent};
pub use history::HistoryStore;
pub use pipeline::{
    analyze_team_json, correlate_json, AnalyzerConfig, BurnoutAnalyzer, BurnoutProcessor,
    EntityAssessment, EntityInput,
};
pub use trend::{CurrentMetrics, PredictionResult, RiskTrajectory, TrackedMetric, TrendResult};
pub use types::RiskLevel;

/// Engine version embedded in all reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "burnout-engine";
