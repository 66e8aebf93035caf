use std::path::PathBuf;

use thiserror::Error;

/// Invalid search configuration. Raised at construction; a run never starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("no parameters selected")]
    NoParameters,

    #[error("{count} parameters selected, at most {max} are supported")]
    TooManyParameters { count: usize, max: usize },

    #[error("parameter name must not be empty")]
    EmptyParameterName,

    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    #[error("parameter '{name}': {reason}")]
    InvalidContinuous { name: String, reason: String },

    #[error("parameter '{0}' has no options")]
    EmptyOptions(String),

    #[error("parameter '{name}' lists option {option} more than once")]
    DuplicateOption { name: String, option: String },

    #[error("{count} objective(s) defined, a Pareto search needs at least 2")]
    TooFewObjectives { count: usize },

    #[error("no objectives defined")]
    NoObjectives,

    #[error("duplicate objective '{0}'")]
    DuplicateObjective(String),

    #[error("target value for '{0}' must be finite")]
    InvalidTarget(String),

    #[error("cannot parse constraint '{0}' (expected e.g. \"ase < 10\")")]
    InvalidConstraint(String),

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Failure reported by a fitness function for one design.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The evaluation ran and failed. Non-fatal for the run.
    #[error("evaluation failed: {0:#}")]
    Failed(#[from] anyhow::Error),

    /// The evaluation was aborted on request. Ends the run cleanly.
    #[error("evaluation cancelled")]
    Cancelled,
}

impl EvaluationError {
    pub fn failed(msg: impl Into<String>) -> Self {
        EvaluationError::Failed(anyhow::anyhow!(msg.into()))
    }
}

/// A checkpoint could not be read or does not fit the live configuration.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checkpoint was written by a {found} optimizer, expected {expected}")]
    KindMismatch { expected: String, found: String },

    #[error("checkpoint parameters do not match the configured parameters")]
    ParameterMismatch,

    #[error("checkpoint results were scored under different objectives or constraints")]
    ObjectiveMismatch,

    #[error("malformed checkpoint: {0}")]
    Malformed(String),
}

/// Fatal engine errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
