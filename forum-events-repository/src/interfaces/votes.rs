use async_trait::async_trait;
use forum_events_shared::types::TargetType;

use crate::errors::RepositoryError;

/// Access to the per-voter vote ledger and the cached tallies derived from it.
///
/// The ledger holds one row per `(voter_address, target_id, target_type)` and is
/// written by the forum's write path. The pipeline never writes the ledger; it
/// only refreshes cached tallies from it.
#[async_trait]
pub trait VotesRepository: Send + Sync {
    /// Recomputes the cached tally of a target from the ledger and persists it.
    ///
    /// The tally is the sum of every voter's current value (`+1` upvote, `-1`
    /// downvote, `0` unvote). Calling this any number of times without ledger
    /// changes in between yields the same result.
    ///
    /// # Returns
    ///
    /// * `Ok(i64)` - The freshly stored tally
    /// * `Err(RepositoryError)` - The target does not exist or the store failed
    async fn recompute_tally(
        &self,
        target_id: i64,
        target_type: TargetType,
    ) -> Result<i64, RepositoryError>;
}
