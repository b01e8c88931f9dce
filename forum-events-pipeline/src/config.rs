//! Runtime parameters of the pipeline.
use std::time::Duration;

use forum_events_shared::types::StreamKind;

/// Configuration for the consumer, buffer and processors.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Consumer group shared by every instance of the pipeline.
    pub group: String,
    /// Name of this instance inside the group.
    pub consumer_name: String,
    pub votes_stream: String,
    pub signins_stream: String,
    /// Entry count at which the buffer is flushed.
    pub buffer_max_entries: usize,
    /// Time after the last flush at which a non-empty buffer is flushed.
    pub flush_interval: Duration,
    /// Pending entries idle for longer than this are claimed.
    pub claim_min_idle: Duration,
    pub claim_batch_size: usize,
    pub read_block: Duration,
    pub read_batch_size: usize,
    /// Concurrent tally recomputations per flush.
    pub tally_concurrency: usize,
    /// Chain accepted for NFT avatars.
    pub chain_id: u64,
    /// Delay before retrying after a failed claim or read.
    pub error_backoff: Duration,
    /// Interval of the progress log line.
    pub progress_interval: Duration,
}

impl PipelineConfig {
    /// Configured streams with their event kind, in claim priority order.
    pub fn streams(&self) -> Vec<(String, StreamKind)> {
        vec![
            (self.votes_stream.clone(), StreamKind::Votes),
            (self.signins_stream.clone(), StreamKind::Signins),
        ]
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            group: "forum-events".to_string(),
            consumer_name: "forum-events-0".to_string(),
            votes_stream: "votes".to_string(),
            signins_stream: "signins".to_string(),
            buffer_max_entries: 1000,
            flush_interval: Duration::from_secs(15),
            claim_min_idle: Duration::from_secs(300),
            claim_batch_size: 1000,
            read_block: Duration::from_millis(5000),
            read_batch_size: 100,
            tally_concurrency: 8,
            chain_id: 1,
            error_backoff: Duration::from_secs(1),
            progress_interval: Duration::from_secs(60),
        }
    }
}
