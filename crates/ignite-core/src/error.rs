//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] ignite_storage::StorageError),

    #[error("{0}")]
    Api(#[from] ignite_api::ApiError),

    #[error("{0}")]
    Session(#[from] ignite_session::SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
