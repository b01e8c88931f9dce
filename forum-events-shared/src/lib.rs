//! # Forum Events Shared
//! Domain types shared by the forum events pipeline crates, and the codec that
//! turns raw log payloads into typed events.
pub mod codec;
pub mod types;

pub use codec::{CodecError, ForumEvent};
