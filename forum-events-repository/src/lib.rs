//! # Forum Events Repository
//! This crate provides the traits the pipeline uses to reach the forum's
//! relational store, with a PostgreSQL implementation and an in-memory one
//! for tests and local runs.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;

pub use errors::RepositoryError;
pub use interfaces::{UsersRepository, VotesRepository};
pub use memory::MemoryForumRepository;
pub use postgres::PostgresForumRepository;
