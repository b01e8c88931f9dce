//! Error types for the orchestrator.
use thiserror::Error;

use crate::errors::ConsumerError;

/// Represents errors that stop the orchestrator before it starts consuming.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),
}
