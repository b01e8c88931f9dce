//! Orchestrator for the forum event pipeline.
//!
//! Owns the coalescing buffer and drives the consumer loop on a single task:
//! flush check, poll, stage and acknowledge. On shutdown the loop stops
//! polling, flushes the buffer once more and closes the log.
mod shutdown;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{error, info, instrument};

pub use shutdown::ShutdownHandle;

use crate::buffer::CoalescingBuffer;
use crate::config::PipelineConfig;
use crate::consumer::{EventConsumer, EventLog};
use crate::errors::OrchestratorError;
use crate::metrics::PipelineStats;
use crate::processor::{IdentityHydrator, VoteAggregator};

pub struct Orchestrator {
    consumer: EventConsumer,
    buffer: CoalescingBuffer,
    votes: VoteAggregator,
    identities: IdentityHydrator,
    config: PipelineConfig,
    stats: Arc<PipelineStats>,
    shutdown: ShutdownHandle,
}

impl Orchestrator {
    pub fn new(
        log: Arc<dyn EventLog>,
        votes: VoteAggregator,
        identities: IdentityHydrator,
        config: PipelineConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            consumer: EventConsumer::new(log, &config, stats.clone()),
            buffer: CoalescingBuffer::new(config.buffer_max_entries, config.flush_interval),
            votes,
            identities,
            config,
            stats,
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Handle that stops [`run`](Self::run) gracefully.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Runs until shutdown is requested.
    ///
    /// Fails only if the consumer groups cannot be created. Errors while
    /// polling are logged and retried after a backoff.
    #[instrument(skip(self), fields(group = %self.config.group, consumer = %self.config.consumer_name))]
    pub async fn run(mut self) -> Result<(), OrchestratorError> {
        info!("Starting forum events orchestrator");
        self.consumer.ensure_groups().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut last_progress = Instant::now();

        while !self.shutdown.is_triggered() {
            let now = Instant::now();
            if self.buffer.should_flush(now) {
                self.flush(now).await;
            }

            if now.duration_since(last_progress) >= self.config.progress_interval {
                self.stats.log_progress();
                last_progress = now;
            }

            match self.consumer.poll().await {
                Ok(deliveries) => {
                    self.consumer
                        .stage_and_ack(deliveries, &mut self.buffer)
                        .await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to poll event log");
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                        _ = shutdown_rx.recv() => {}
                    }
                }
            }
        }

        info!(buffered = self.buffer.len(), "Draining buffer before shutdown");
        self.flush(Instant::now()).await;
        self.consumer.log().close().await;

        self.stats.log_progress();
        info!("Orchestrator shutdown complete");
        Ok(())
    }

    /// Empties the buffer, then runs vote aggregation and identity hydration
    /// concurrently on what it held.
    async fn flush(&mut self, now: Instant) {
        let batch = self.buffer.take(now);
        if batch.is_empty() {
            return;
        }

        PipelineStats::incr(&self.stats.flushes);
        info!(
            votes = batch.votes.len(),
            signins = batch.signins.len(),
            "Flushing buffer"
        );

        tokio::join!(
            self.votes.process(batch.tally_targets()),
            self.identities.process(batch.addresses()),
        );
    }
}
