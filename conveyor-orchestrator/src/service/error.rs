use conveyor_core::domain::publish::TransitionError;
use conveyor_core::domain::setting::SettingKind;
use thiserror::Error;

/// Errors returned by the pipeline manager
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or incomplete integration settings
    #[error("{0}")]
    Config(String),

    #[error("integration setting {id} is of type {actual}, expected {expected}")]
    SettingKind {
        id: i64,
        expected: SettingKind,
        actual: SettingKind,
    },

    /// An Init/Running job already occupies the execution scope
    #[error("current stage already has running jobs ({job_ids}), retry after they finish")]
    Conflict { job_ids: String },

    #[error(transparent)]
    InvalidState(#[from] TransitionError),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// CI driver, source control or cluster failure
    #[error("{0}")]
    External(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound(what.into())
    }

    /// Wraps a driver error, keeping its context chain
    pub fn external(context: &str, err: anyhow::Error) -> Self {
        EngineError::External(format!("{}: {:#}", context, err))
    }

    pub fn conflict(job_ids: &[i64]) -> Self {
        EngineError::Conflict {
            job_ids: job_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}
