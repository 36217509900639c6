//! Failure classification
//!
//! The single place that looks inside a failed exchange. Everything else in
//! the workspace only ever sees the resulting [`ApiError`].

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::ApiError;

/// Raw shape of a failed exchange, before classification.
#[derive(Debug)]
pub(crate) enum Failure {
    /// A response arrived with a non-success status
    Status { status: StatusCode, body: Vec<u8> },
    /// The request could not be built, sent, or its response read
    Transport(reqwest::Error),
    /// A success response whose body did not match the expected shape
    Decode(serde_json::Error),
}

pub(crate) fn classify(failure: Failure) -> ApiError {
    match failure {
        Failure::Status { status, body } => match server_message(&body) {
            Some(message) => ApiError::Domain(message),
            None => ApiError::Unknown(format!("request failed with status {status}")),
        },
        Failure::Transport(err) => {
            if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
                ApiError::Network
            } else {
                ApiError::Unknown(err.to_string())
            }
        }
        Failure::Decode(err) => ApiError::Unknown(format!("unexpected response body: {err}")),
    }
}

/// Server-authored `message` field of a JSON object error body.
fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}
