//! Typed (de)serialization of the events carried on the durable log.
//!
//! Each log entry carries an opaque `body` holding one JSON object. The stream
//! an entry was read from decides which event type the body decodes into.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{SigninEvent, StreamKind, VoteEvent};

/// Represents errors that can occur while decoding or encoding an event body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed {kind} payload: {source}")]
    Malformed {
        kind: StreamKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {kind} payload: {reason}")]
    Invalid { kind: StreamKind, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A decoded event from one of the pipeline's streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForumEvent {
    Vote(VoteEvent),
    Signin(SigninEvent),
}

impl ForumEvent {
    /// The stream this event travels on.
    pub fn kind(&self) -> StreamKind {
        match self {
            ForumEvent::Vote(_) => StreamKind::Votes,
            ForumEvent::Signin(_) => StreamKind::Signins,
        }
    }

    /// Key under which the coalescing buffer collapses repeats of this event.
    pub fn dedup_key(&self) -> String {
        match self {
            ForumEvent::Vote(vote) => vote.dedup_key(),
            ForumEvent::Signin(signin) => signin.dedup_key(),
        }
    }

    /// Decodes a raw body read from a stream of the given kind.
    pub fn decode(kind: StreamKind, body: &[u8]) -> Result<Self, CodecError> {
        let event = match kind {
            StreamKind::Votes => ForumEvent::Vote(
                serde_json::from_slice::<VoteEvent>(body)
                    .map_err(|source| CodecError::Malformed { kind, source })?,
            ),
            StreamKind::Signins => ForumEvent::Signin(
                serde_json::from_slice::<SigninEvent>(body)
                    .map_err(|source| CodecError::Malformed { kind, source })?,
            ),
        };
        event.validate()?;
        Ok(event)
    }

    /// Encodes the event into the body format its stream expects.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let body = match self {
            ForumEvent::Vote(vote) => serde_json::to_vec(vote)?,
            ForumEvent::Signin(signin) => serde_json::to_vec(signin)?,
        };
        Ok(body)
    }

    fn validate(&self) -> Result<(), CodecError> {
        let address = match self {
            ForumEvent::Vote(vote) => &vote.voter_address,
            ForumEvent::Signin(signin) => &signin.address,
        };
        if address.trim().is_empty() {
            return Err(CodecError::Invalid {
                kind: self.kind(),
                reason: "empty address".to_string(),
            });
        }
        Ok(())
    }
}

impl From<VoteEvent> for ForumEvent {
    fn from(vote: VoteEvent) -> Self {
        ForumEvent::Vote(vote)
    }
}

impl From<SigninEvent> for ForumEvent {
    fn from(signin: SigninEvent) -> Self {
        ForumEvent::Signin(signin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TargetType, VoteValue};

    const ADDRESS: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    #[test]
    fn test_decode_vote() {
        let body = format!(
            r#"{{"id":42,"address":"{ADDRESS}","type":"comment","value":"downvote","updatedAt":1713859200000}}"#
        );

        let event = ForumEvent::decode(StreamKind::Votes, body.as_bytes()).unwrap();

        assert_eq!(
            event,
            ForumEvent::Vote(VoteEvent {
                target_id: 42,
                voter_address: ADDRESS.to_string(),
                target_type: TargetType::Comment,
                value: VoteValue::Downvote,
                observed_at_millis: 1713859200000,
            })
        );
        assert_eq!(event.dedup_key(), "comment:42");
    }

    #[test]
    fn test_decode_signin() {
        let body = format!(r#"{{"address":"{ADDRESS}"}}"#);

        let event = ForumEvent::decode(StreamKind::Signins, body.as_bytes()).unwrap();

        assert_eq!(event, ForumEvent::Signin(SigninEvent::new(ADDRESS)));
        assert_eq!(event.dedup_key(), ADDRESS);
        assert_eq!(event.kind(), StreamKind::Signins);
    }

    #[test]
    fn test_decode_rejects_unknown_vote_value() {
        let body = format!(
            r#"{{"id":1,"address":"{ADDRESS}","type":"thread","value":"superlike","updatedAt":0}}"#
        );

        let result = ForumEvent::decode(StreamKind::Votes, body.as_bytes());

        assert!(matches!(
            result,
            Err(CodecError::Malformed {
                kind: StreamKind::Votes,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_rejects_body_from_wrong_stream() {
        let body = format!(r#"{{"address":"{ADDRESS}"}}"#);

        assert!(ForumEvent::decode(StreamKind::Votes, body.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_rejects_empty_address() {
        let result = ForumEvent::decode(StreamKind::Signins, br#"{"address":"  "}"#);

        assert!(matches!(result, Err(CodecError::Invalid { .. })));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ForumEvent::decode(StreamKind::Signins, b"\x00\x01not json").is_err());
        assert!(ForumEvent::decode(StreamKind::Votes, b"").is_err());
    }

    #[test]
    fn test_encode_uses_wire_field_names() {
        let event = ForumEvent::Vote(VoteEvent {
            target_id: 7,
            voter_address: ADDRESS.to_string(),
            target_type: TargetType::Thread,
            value: VoteValue::Unvote,
            observed_at_millis: 5,
        });

        let body = event.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["address"], ADDRESS);
        assert_eq!(json["type"], "thread");
        assert_eq!(json["value"], "unvote");
        assert_eq!(json["updatedAt"], 5);
    }
}
