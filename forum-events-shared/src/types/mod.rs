mod image;
mod signin_event;
mod stream_kind;
mod user_identity;
mod vote_event;

pub use image::Image;
pub use signin_event::SigninEvent;
pub use stream_kind::StreamKind;
pub use user_identity::UserIdentity;
pub use vote_event::{TargetType, VoteEvent, VoteValue};

/// Identifies a votable target: `(target_id, target_type)`.
pub type TallyTarget = (i64, TargetType);
