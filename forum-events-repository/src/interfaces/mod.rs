//! This module defines and re-exports the interfaces for the forum repository.
mod users;
mod votes;

pub use users::UsersRepository;
pub use votes::VotesRepository;
