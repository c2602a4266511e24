//! Error types for the burnout engine
//!
//! Data-quality problems (missing streams, malformed timestamps, unknown
//! timezones) are never errors: they degrade the output and are logged. Only
//! configuration and payload problems surface here.

use thiserror::Error;

use crate::cbi::ConfigError;

/// Errors that can occur while configuring or driving the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid history payload: {0}")]
    InvalidHistory(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
