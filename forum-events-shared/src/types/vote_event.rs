use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TallyTarget;

/// The kind of content a vote is cast on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Thread,
    Comment,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Thread => "thread",
            TargetType::Comment => "comment",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A voter's current intent toward a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Upvote,
    Downvote,
    Unvote,
}

impl VoteValue {
    /// Contribution of this vote to a target's tally.
    pub fn weight(&self) -> i64 {
        match self {
            VoteValue::Upvote => 1,
            VoteValue::Downvote => -1,
            VoteValue::Unvote => 0,
        }
    }
}

/// Represents one voter's intent toward one target at the time the write path
/// accepted the vote.
///
/// The pipeline only uses it to learn which target needs its tally
/// recomputed; the per-voter ledger in the store is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    #[serde(rename = "id")]
    pub target_id: i64,
    #[serde(rename = "address")]
    pub voter_address: String,
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub value: VoteValue,
    #[serde(rename = "updatedAt")]
    pub observed_at_millis: i64,
}

impl VoteEvent {
    /// The `(target_id, target_type)` pair this vote touches.
    pub fn target(&self) -> TallyTarget {
        (self.target_id, self.target_type)
    }

    /// Key under which repeated votes on the same target collapse.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.target_type, self.target_id)
    }
}
