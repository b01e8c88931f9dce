//! Error types for the consumer module.
use thiserror::Error;

use crate::errors::LogError;

/// Represents errors that can occur while claiming or reading log entries.
///
/// Decode and acknowledgement failures are not represented here; they are
/// handled per entry and never surface to the caller.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Failed to create consumer group {group} on stream {stream}: {source}")]
    GroupSetup {
        stream: String,
        group: String,
        #[source]
        source: LogError,
    },

    #[error("Failed to claim stale entries from {stream}: {source}")]
    Claim {
        stream: String,
        #[source]
        source: LogError,
    },

    #[error("Failed to read new entries: {0}")]
    Read(#[source] LogError),
}
