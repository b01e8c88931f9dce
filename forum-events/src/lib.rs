//! # Forum Events
//!
//! Runs the forum's asynchronous event pipeline: votes and sign-ins queued on
//! Redis Streams are coalesced, then drive tally recomputation in PostgreSQL
//! and ENS name/avatar hydration of user identities.
//!
//! ## Modules
//!
//! - [`config`]: environment settings and dependency wiring
//! - [`errors`]: startup and runtime errors

pub mod config;
pub mod errors;

pub use config::{ConnectionMode, Dependencies, Settings};
pub use errors::AppError;
