//! Process-local coalescing buffer.
//!
//! Holds at most one entry per dedup key. A later staging for the same key
//! replaces the earlier one by arrival order, not by the event's embedded
//! timestamp. That is safe only because every downstream effect recomputes
//! from authoritative state instead of applying the buffered payload; an event
//! type applied directly from its payload must not be coalesced this way.
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use forum_events_shared::ForumEvent;
use forum_events_shared::types::{SigninEvent, StreamKind, TallyTarget, VoteEvent};
use tokio::time::Instant;

/// An event waiting for the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedEntry {
    pub dedup_key: String,
    pub payload: ForumEvent,
    pub origin_stream: StreamKind,
    /// Id of the log entry the event was read from.
    pub log_position: String,
}

impl BufferedEntry {
    pub fn new(payload: ForumEvent, origin_stream: StreamKind, log_position: impl Into<String>) -> Self {
        Self {
            dedup_key: payload.dedup_key(),
            payload,
            origin_stream,
            log_position: log_position.into(),
        }
    }
}

/// The contents of the buffer at flush time, split by event kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushBatch {
    pub votes: Vec<VoteEvent>,
    pub signins: Vec<SigninEvent>,
}

impl FlushBatch {
    pub fn len(&self) -> usize {
        self.votes.len() + self.signins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty() && self.signins.is_empty()
    }

    /// Distinct targets touched by the batch's votes.
    pub fn tally_targets(&self) -> Vec<TallyTarget> {
        let mut seen = HashSet::new();
        self.votes
            .iter()
            .map(VoteEvent::target)
            .filter(|target| seen.insert(*target))
            .collect()
    }

    /// Distinct addresses of the batch's sign-ins, case-insensitively.
    pub fn addresses(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.signins
            .iter()
            .filter(|signin| seen.insert(signin.address.to_lowercase()))
            .map(|signin| signin.address.clone())
            .collect()
    }
}

impl FromIterator<BufferedEntry> for FlushBatch {
    fn from_iter<I: IntoIterator<Item = BufferedEntry>>(entries: I) -> Self {
        let mut batch = FlushBatch::default();
        for entry in entries {
            match entry.payload {
                ForumEvent::Vote(vote) => batch.votes.push(vote),
                ForumEvent::Signin(signin) => batch.signins.push(signin),
            }
        }
        batch
    }
}

pub struct CoalescingBuffer {
    entries: HashMap<String, BufferedEntry>,
    last_flush_at: Instant,
    max_entries: usize,
    flush_interval: Duration,
}

impl CoalescingBuffer {
    pub fn new(max_entries: usize, flush_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            last_flush_at: Instant::now(),
            max_entries,
            flush_interval,
        }
    }

    /// Inserts the entry, replacing any entry with the same dedup key.
    /// Returns the replaced entry.
    pub fn stage(&mut self, entry: BufferedEntry) -> Option<BufferedEntry> {
        self.entries.insert(entry.dedup_key.clone(), entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, dedup_key: &str) -> Option<&BufferedEntry> {
        self.entries.get(dedup_key)
    }

    pub fn should_flush(&self, now: Instant) -> bool {
        if self.entries.len() >= self.max_entries {
            return true;
        }
        !self.entries.is_empty() && now.duration_since(self.last_flush_at) >= self.flush_interval
    }

    /// Swaps the contents out for an empty map and restarts the flush timer.
    ///
    /// The buffer is empty when this returns, whatever happens to the batch.
    pub fn take(&mut self, now: Instant) -> FlushBatch {
        self.last_flush_at = now;
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use forum_events_shared::types::{TargetType, VoteValue};

    use super::*;

    fn vote(target_id: i64, voter: &str, value: VoteValue) -> BufferedEntry {
        BufferedEntry::new(
            ForumEvent::Vote(VoteEvent {
                target_id,
                voter_address: voter.to_string(),
                target_type: TargetType::Comment,
                value,
                observed_at_millis: 1_700_000_000_000,
            }),
            StreamKind::Votes,
            format!("{target_id}-0"),
        )
    }

    fn signin(address: &str) -> BufferedEntry {
        BufferedEntry::new(
            ForumEvent::Signin(SigninEvent::new(address)),
            StreamKind::Signins,
            "1-0",
        )
    }

    #[test]
    fn test_stage_coalesces_same_key() {
        let mut buffer = CoalescingBuffer::new(1000, Duration::from_secs(15));

        assert!(buffer.stage(vote(42, "0xX", VoteValue::Upvote)).is_none());
        let replaced = buffer.stage(vote(42, "0xX", VoteValue::Downvote));

        assert!(replaced.is_some());
        assert_eq!(buffer.len(), 1);
        assert_eq!(
            buffer.get("comment:42"),
            Some(&vote(42, "0xX", VoteValue::Downvote))
        );
    }

    #[test]
    fn test_stage_many_of_one_key_flushes_one_target() {
        let mut buffer = CoalescingBuffer::new(1000, Duration::from_secs(15));
        for voter in ["0xA", "0xB", "0xC", "0xD"] {
            buffer.stage(vote(7, voter, VoteValue::Upvote));
        }

        let batch = buffer.take(Instant::now());

        assert_eq!(batch.votes.len(), 1);
        assert_eq!(batch.votes[0].voter_address, "0xD");
        assert_eq!(batch.tally_targets(), vec![(7, TargetType::Comment)]);
    }

    #[test]
    fn test_votes_and_signins_are_split() {
        let mut buffer = CoalescingBuffer::new(1000, Duration::from_secs(15));
        buffer.stage(vote(1, "0xA", VoteValue::Upvote));
        buffer.stage(vote(2, "0xA", VoteValue::Upvote));
        buffer.stage(signin("0xA"));

        let batch = buffer.take(Instant::now());

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.votes.len(), 2);
        assert_eq!(batch.addresses(), vec!["0xA".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_addresses_are_distinct_ignoring_case() {
        let batch = FlushBatch {
            votes: vec![],
            signins: vec![SigninEvent::new("0xAbC"), SigninEvent::new("0xabc")],
        };

        assert_eq!(batch.addresses().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_triggers_without_waiting() {
        let mut buffer = CoalescingBuffer::new(3, Duration::from_secs(15));
        for id in 0..3 {
            buffer.stage(vote(id, "0xA", VoteValue::Upvote));
        }

        assert!(buffer.should_flush(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_threshold_flushes_single_entry() {
        let mut buffer = CoalescingBuffer::new(1000, Duration::from_secs(15));
        buffer.stage(signin("0xA"));

        assert!(!buffer.should_flush(Instant::now()));

        tokio::time::advance(Duration::from_secs(16)).await;

        assert!(buffer.should_flush(Instant::now()));
        let batch = buffer.take(Instant::now());
        assert_eq!(batch.signins, vec![SigninEvent::new("0xA")]);
        assert!(!buffer.should_flush(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_buffer_never_flushes_on_time() {
        let buffer = CoalescingBuffer::new(1000, Duration::from_secs(15));

        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(!buffer.should_flush(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_resets_flush_timer() {
        let mut buffer = CoalescingBuffer::new(1000, Duration::from_secs(15));
        tokio::time::advance(Duration::from_secs(20)).await;
        buffer.take(Instant::now());

        buffer.stage(signin("0xB"));

        assert!(!buffer.should_flush(Instant::now()));
    }
}
