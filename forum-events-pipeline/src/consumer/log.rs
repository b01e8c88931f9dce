//! Durable log interface with consumer-group semantics.
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::LogError;

/// A delivered log entry: an opaque id and the raw event body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub body: Vec<u8>,
}

impl LogEntry {
    pub fn new(id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// Entries returned for one stream by a multi-stream read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntries {
    pub stream: String,
    pub entries: Vec<LogEntry>,
}

/// Append-only log with consumer groups, a pending-entry list (PEL) per group
/// and a claim operation for stale pending entries.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Creates the group at the stream's tail if it does not exist.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), LogError>;

    /// Reassigns pending entries idle for at least `min_idle` to `consumer`.
    async fn claim_stale(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        max_count: usize,
    ) -> Result<Vec<LogEntry>, LogError>;

    /// Blocks up to `block` for entries never delivered to the group.
    /// Returns an empty list on timeout.
    async fn read_new(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        block: Duration,
        max_count: usize,
    ) -> Result<Vec<StreamEntries>, LogError>;

    /// Removes an entry from the group's PEL.
    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), LogError>;

    /// Stops accepting reads. Later claims and reads fail with
    /// [`LogError::Closed`].
    async fn close(&self);
}
