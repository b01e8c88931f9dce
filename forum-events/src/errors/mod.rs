use forum_events_identity::ResolveError;
use forum_events_pipeline::{LogError, OrchestratorError};
use forum_events_repository::RepositoryError;
use thiserror::Error;

/// Errors that can occur during startup or while running the pipeline.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Event log error: {0}")]
    Log(#[from] LogError),

    #[error("Identity resolution setup error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
