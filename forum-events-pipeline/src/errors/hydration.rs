//! Error types for identity hydration.
use forum_events_identity::ResolveError;
use forum_events_repository::RepositoryError;
use thiserror::Error;

/// Represents why hydration of a single address stopped.
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Avatar is on chain {found}, expected chain {expected}")]
    ChainMismatch { expected: u64, found: u64 },

    #[error("Metadata at {0} has no image")]
    MissingImage(String),

    #[error("Resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Persistence failed: {0}")]
    Repository(#[from] RepositoryError),
}
