//! Error types for the durable log client.
use thiserror::Error;

/// Represents errors returned by an [`EventLog`](crate::EventLog) implementation.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Log client is closed")]
    Closed,

    #[error("Log error: {0}")]
    Other(String),
}
