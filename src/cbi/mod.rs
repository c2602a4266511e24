//! Copenhagen Burnout Inventory scoring
//!
//! - `config`: factor weights, dimension weights and score bands
//! - `scorer`: dimension and composite scoring
//! - `recommendations`: threshold-driven follow-up actions

pub mod config;
pub mod recommendations;
pub mod scorer;

pub use config::{
    CbiConfig, CbiFactor, ConfigError, Dimension, DimensionWeights, FactorSpec, FactorWeights,
    ScoreBands,
};
pub use recommendations::{recommend, Priority, Recommendation, RecommendationKind};
pub use scorer::{
    interpret, score_composite, score_dimension, CbiResult, CbiScorer, DimensionScore,
    FactorComponent, FactorMetrics, Interpretation,
};
