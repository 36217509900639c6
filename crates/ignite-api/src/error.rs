//! API error types

use thiserror::Error;

/// Every failure a caller of the gateway can observe.
///
/// `Domain`, `Network` and `Unknown` are produced only by the classifier.
/// `Validation` is produced by local pre-flight checks before a request is
/// ever sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server rejected the request with a message meant for the user
    #[error("{0}")]
    Domain(String),

    /// The request went out but no response came back
    #[error("Network error: no response from server")]
    Network,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Message to show the user, or `fallback` when the error carries none.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Domain(message) | ApiError::Validation(message) => message.clone(),
            ApiError::Network | ApiError::Unknown(_) => fallback.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network)
    }
}
