//! Session error types

use ignite_api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] ignite_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Another session operation is in progress")]
    Busy,

    #[error("Session has not been restored yet")]
    NotRestored,

    #[error("No authenticated user")]
    NotAuthenticated,
}

impl SessionError {
    /// The classified API error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SessionError::Api(err) => Some(err),
            _ => None,
        }
    }
}
