//! Downstream effects of a flushed batch.
mod identity;
mod votes;

pub use identity::{HydrationOutcome, IdentityHydrator};
pub use votes::VoteAggregator;
