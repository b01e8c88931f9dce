use std::sync::Arc;

use forum_events_repository::VotesRepository;
use forum_events_shared::types::TallyTarget;
use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, instrument, warn};

use crate::metrics::PipelineStats;

/// Recomputes cached tallies for the targets touched by a flush.
///
/// Each target is recomputed from the per-voter ledger, so duplicated or
/// reordered events only cost an extra recomputation. A failing target is
/// logged and skipped.
pub struct VoteAggregator {
    repository: Arc<dyn VotesRepository>,
    concurrency: usize,
    stats: Arc<PipelineStats>,
}

impl VoteAggregator {
    pub fn new(
        repository: Arc<dyn VotesRepository>,
        concurrency: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            repository,
            concurrency: concurrency.max(1),
            stats,
        }
    }

    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn process(&self, targets: Vec<TallyTarget>) {
        if targets.is_empty() {
            return;
        }

        let total = targets.len();
        stream::iter(targets)
            .for_each_concurrent(self.concurrency, |(target_id, target_type)| async move {
                match self.repository.recompute_tally(target_id, target_type).await {
                    Ok(tally) => {
                        debug!(target_id, %target_type, tally, "Recomputed tally");
                        PipelineStats::incr(&self.stats.tallies_recomputed);
                    }
                    Err(e) => {
                        warn!(target_id, %target_type, error = %e, "Failed to recompute tally");
                        PipelineStats::incr(&self.stats.tally_failures);
                    }
                }
            })
            .await;

        info!(targets = total, "Vote aggregation complete");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use forum_events_repository::{MemoryForumRepository, RepositoryError};
    use forum_events_shared::types::{TargetType, VoteValue};
    use std::sync::atomic::Ordering;

    use super::*;

    const VOTER_X: &str = "0x000000000000000000000000000000000000000A";
    const VOTER_Y: &str = "0x000000000000000000000000000000000000000B";

    /// Fails every recomputation of one target, delegating the rest.
    struct FlakyRepository {
        inner: MemoryForumRepository,
        failing: TallyTarget,
    }

    #[async_trait]
    impl VotesRepository for FlakyRepository {
        async fn recompute_tally(
            &self,
            target_id: i64,
            target_type: TargetType,
        ) -> Result<i64, RepositoryError> {
            if (target_id, target_type) == self.failing {
                return Err(RepositoryError::TargetNotFound {
                    target_id,
                    target_type,
                });
            }
            self.inner.recompute_tally(target_id, target_type).await
        }
    }

    #[tokio::test]
    async fn test_recompute_uses_ledger_not_buffered_events() {
        let repository = Arc::new(MemoryForumRepository::new());
        repository.record_vote(VOTER_X, 42, TargetType::Comment, VoteValue::Upvote);
        repository.record_vote(VOTER_X, 42, TargetType::Comment, VoteValue::Downvote);
        let stats = Arc::new(PipelineStats::new());
        let aggregator = VoteAggregator::new(repository.clone(), 4, stats.clone());

        aggregator.process(vec![(42, TargetType::Comment)]).await;

        assert_eq!(repository.tally(42, TargetType::Comment), Some(-1));
        assert_eq!(stats.tallies_recomputed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failing_target_does_not_block_others() {
        let inner = MemoryForumRepository::new();
        inner.create_target(1, TargetType::Thread);
        inner.record_vote(VOTER_X, 2, TargetType::Thread, VoteValue::Upvote);
        inner.record_vote(VOTER_Y, 2, TargetType::Thread, VoteValue::Upvote);
        let repository = Arc::new(FlakyRepository {
            inner,
            failing: (1, TargetType::Thread),
        });
        let stats = Arc::new(PipelineStats::new());
        let aggregator = VoteAggregator::new(repository.clone(), 4, stats.clone());

        aggregator
            .process(vec![(1, TargetType::Thread), (2, TargetType::Thread)])
            .await;

        assert_eq!(repository.inner.tally(1, TargetType::Thread), Some(0));
        assert_eq!(repository.inner.tally(2, TargetType::Thread), Some(2));
        assert_eq!(stats.tally_failures.load(Ordering::Relaxed), 1);
        assert_eq!(stats.tallies_recomputed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let repository = Arc::new(MemoryForumRepository::new());
        let stats = Arc::new(PipelineStats::new());
        let aggregator = VoteAggregator::new(repository, 4, stats.clone());

        aggregator.process(vec![]).await;

        assert_eq!(stats.tallies_recomputed.load(Ordering::Relaxed), 0);
    }
}
