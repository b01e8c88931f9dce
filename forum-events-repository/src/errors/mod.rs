//! Error types for the forum repository.
use forum_events_shared::types::TargetType;
use thiserror::Error;

/// Represents errors that can occur within the forum repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{target_type} {target_id} not found")]
    TargetNotFound { target_id: i64, target_type: TargetType },

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
