//! Ignite Gym Storage Layer
//!
//! SQLite-backed key/value persistence for the client.
//! Every write is a single statement, so a failed write never leaves a
//! partially written value behind.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
