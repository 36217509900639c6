//! Ignite Gym API
//!
//! One configured HTTP client shared by every caller. Failed requests are
//! normalized by the classifier into [`ApiError`]; nothing outside this
//! crate ever sees a raw transport error.

mod catalog;
mod classifier;
mod config;
mod error;
mod gateway;
mod models;
mod upload;

pub use catalog::Catalog;
pub use config::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use error::ApiError;
pub use gateway::{HttpGateway, RequestBody};
pub use models::{Exercise, HistoryDay, HistoryEntry, SignInResponse, UserSession};
pub use upload::{AvatarUpload, MAX_AVATAR_BYTES};

pub type Result<T> = std::result::Result<T, ApiError>;
