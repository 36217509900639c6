//! Ignite Gym Session Management
//!
//! - One authenticated session per device, mirrored to local storage
//! - Local storage is only a cold-start cache; the server confirms every change
//! - Screens read [`AuthState`] and subscribe for settled transitions
//! - Mutations are serialized, see [`MutationPolicy`]

mod error;
mod manager;
mod session;
mod storage;

pub use error::SessionError;
pub use manager::{ListenerId, SessionStore};
pub use session::{AuthState, MutationPolicy, ProfileUpdate, SessionPhase};
pub use storage::{MemoryUserStorage, SqliteUserStorage, UserStorage, USER_STORAGE_KEY};

pub type Result<T> = std::result::Result<T, SessionError>;
