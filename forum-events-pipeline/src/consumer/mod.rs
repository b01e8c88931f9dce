//! Consumer over the durable log.
//!
//! Each poll first claims stale pending entries, one stream at a time in
//! configuration order, and returns the first non-empty claim. Only when
//! nothing is claimable does it block for new entries across all streams.
mod log;
mod redis_log;

use std::sync::Arc;
use std::time::Duration;

use forum_events_shared::ForumEvent;
use forum_events_shared::types::StreamKind;
use tracing::{debug, error, instrument, warn};

pub use log::{EventLog, LogEntry, StreamEntries};
pub use redis_log::RedisEventLog;

use crate::buffer::{BufferedEntry, CoalescingBuffer};
use crate::config::PipelineConfig;
use crate::errors::ConsumerError;
use crate::metrics::PipelineStats;

/// A log entry together with the stream it was delivered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub stream: String,
    pub kind: StreamKind,
    pub entry: LogEntry,
}

pub struct EventConsumer {
    log: Arc<dyn EventLog>,
    streams: Vec<(String, StreamKind)>,
    group: String,
    consumer_name: String,
    claim_min_idle: Duration,
    claim_batch_size: usize,
    read_block: Duration,
    read_batch_size: usize,
    stats: Arc<PipelineStats>,
}

impl EventConsumer {
    pub fn new(log: Arc<dyn EventLog>, config: &PipelineConfig, stats: Arc<PipelineStats>) -> Self {
        Self {
            log,
            streams: config.streams(),
            group: config.group.clone(),
            consumer_name: config.consumer_name.clone(),
            claim_min_idle: config.claim_min_idle,
            claim_batch_size: config.claim_batch_size,
            read_block: config.read_block,
            read_batch_size: config.read_batch_size,
            stats,
        }
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// Creates the consumer group on every configured stream.
    pub async fn ensure_groups(&self) -> Result<(), ConsumerError> {
        for (stream, _) in &self.streams {
            self.log
                .ensure_group(stream, &self.group)
                .await
                .map_err(|source| ConsumerError::GroupSetup {
                    stream: stream.clone(),
                    group: self.group.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Returns the next batch of deliveries: claimed stale entries if any
    /// stream has some, otherwise new entries (possibly none on timeout).
    #[instrument(skip(self), fields(consumer = %self.consumer_name))]
    pub async fn poll(&self) -> Result<Vec<Delivery>, ConsumerError> {
        for (stream, kind) in &self.streams {
            let claimed = self
                .log
                .claim_stale(
                    stream,
                    &self.group,
                    &self.consumer_name,
                    self.claim_min_idle,
                    self.claim_batch_size,
                )
                .await
                .map_err(|source| ConsumerError::Claim {
                    stream: stream.clone(),
                    source,
                })?;

            if !claimed.is_empty() {
                debug!(stream = %stream, count = claimed.len(), "Claimed stale entries");
                PipelineStats::add(&self.stats.entries_claimed, claimed.len());
                return Ok(claimed
                    .into_iter()
                    .map(|entry| Delivery {
                        stream: stream.clone(),
                        kind: *kind,
                        entry,
                    })
                    .collect());
            }
        }

        let names: Vec<String> = self.streams.iter().map(|(name, _)| name.clone()).collect();
        let batches = self
            .log
            .read_new(
                &names,
                &self.group,
                &self.consumer_name,
                self.read_block,
                self.read_batch_size,
            )
            .await
            .map_err(ConsumerError::Read)?;

        let mut deliveries = Vec::new();
        for batch in batches {
            let Some(kind) = self.kind_of(&batch.stream) else {
                warn!(stream = %batch.stream, "Entries from unknown stream ignored");
                continue;
            };
            deliveries.extend(batch.entries.into_iter().map(|entry| Delivery {
                stream: batch.stream.clone(),
                kind,
                entry,
            }));
        }

        PipelineStats::add(&self.stats.entries_received, deliveries.len());
        Ok(deliveries)
    }

    /// Decodes every delivery, stages the decodable ones and acknowledges all
    /// of them. Malformed entries are logged and acknowledged so they do not
    /// stay pending forever.
    pub async fn stage_and_ack(&self, deliveries: Vec<Delivery>, buffer: &mut CoalescingBuffer) {
        for delivery in deliveries {
            match ForumEvent::decode(delivery.kind, &delivery.entry.body) {
                Ok(event) => {
                    let entry = BufferedEntry::new(event, delivery.kind, delivery.entry.id.clone());
                    debug!(dedup_key = %entry.dedup_key, id = %entry.log_position, "Staged event");
                    if buffer.stage(entry).is_some() {
                        PipelineStats::incr(&self.stats.entries_superseded);
                    }
                }
                Err(e) => {
                    error!(
                        stream = %delivery.stream,
                        id = %delivery.entry.id,
                        error = %e,
                        "Failed to decode entry, discarding"
                    );
                    PipelineStats::incr(&self.stats.decode_failures);
                }
            }

            if let Err(e) = self
                .log
                .ack(&delivery.stream, &self.group, &delivery.entry.id)
                .await
            {
                warn!(
                    stream = %delivery.stream,
                    id = %delivery.entry.id,
                    error = %e,
                    "Failed to acknowledge entry"
                );
                PipelineStats::incr(&self.stats.ack_failures);
            }
        }
    }

    fn kind_of(&self, stream: &str) -> Option<StreamKind> {
        self.streams
            .iter()
            .find(|(name, _)| name == stream)
            .map(|(_, kind)| *kind)
    }
}
