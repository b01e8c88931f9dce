//! PostgreSQL implementation of the forum repository.
mod forum_repository;

pub use forum_repository::PostgresForumRepository;
