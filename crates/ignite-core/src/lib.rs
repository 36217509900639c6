//! Ignite Gym Core
//!
//! Startup wiring for the client core. Screens receive an [`App`] and read
//! session state through its [`SessionStore`].

mod app;
mod config;
mod error;

pub use app::App;
pub use config::Config;
pub use error::CoreError;

// Re-export core components
pub use ignite_api::{
    ApiConfig, ApiError, AvatarUpload, Catalog, Exercise, HistoryDay, HistoryEntry, HttpGateway,
    UserSession, MAX_AVATAR_BYTES,
};
pub use ignite_session::{
    AuthState, ListenerId, MutationPolicy, ProfileUpdate, SessionError, SessionPhase,
    SessionStore,
};
pub use ignite_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
