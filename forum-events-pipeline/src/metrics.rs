//! Counters for work the pipeline would otherwise drop silently.
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Monotonic pipeline counters, shared between the consumer, the processors
/// and the orchestrator's progress log.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub entries_received: AtomicU64,
    pub entries_claimed: AtomicU64,
    pub decode_failures: AtomicU64,
    pub ack_failures: AtomicU64,
    pub entries_superseded: AtomicU64,
    pub flushes: AtomicU64,
    pub tallies_recomputed: AtomicU64,
    pub tally_failures: AtomicU64,
    pub identities_hydrated: AtomicU64,
    pub identities_cleared: AtomicU64,
    pub hydration_failures: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn log_progress(&self) {
        info!(
            entries_received = Self::get(&self.entries_received),
            entries_claimed = Self::get(&self.entries_claimed),
            decode_failures = Self::get(&self.decode_failures),
            ack_failures = Self::get(&self.ack_failures),
            entries_superseded = Self::get(&self.entries_superseded),
            flushes = Self::get(&self.flushes),
            tallies_recomputed = Self::get(&self.tallies_recomputed),
            tally_failures = Self::get(&self.tally_failures),
            identities_hydrated = Self::get(&self.identities_hydrated),
            identities_cleared = Self::get(&self.identities_cleared),
            hydration_failures = Self::get(&self.hydration_failures),
            "Pipeline progress"
        );
    }
}
