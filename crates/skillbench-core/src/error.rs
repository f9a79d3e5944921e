use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkillbenchError {
    #[error("evals root not found: {0}")]
    EvalsRootNotFound(PathBuf),

    #[error("experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("invalid experiment '{name}': {reason}")]
    InvalidExperiment { name: String, reason: String },

    #[error("invalid experiment name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidExperimentName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SkillbenchError>;
