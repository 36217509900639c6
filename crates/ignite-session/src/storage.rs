//! Durable storage for the signed-in user
//!
//! Only [`crate::SessionStore`] writes through this adapter.

use async_trait::async_trait;
use ignite_api::UserSession;
use ignite_storage::Database;
use parking_lot::Mutex;

use crate::Result;

/// Settings key holding the serialized [`UserSession`].
pub const USER_STORAGE_KEY: &str = "auth.user";

#[async_trait]
pub trait UserStorage: Send + Sync {
    /// The stored user. Missing, unreadable, or corrupt records are `None`.
    async fn load(&self) -> Option<UserSession>;

    /// Replace the stored user. On failure the previous record stays readable.
    async fn save(&self, user: &UserSession) -> Result<()>;

    /// Forget the stored user. Removing an absent record succeeds.
    async fn remove(&self) -> Result<()>;
}

/// [`UserStorage`] over the SQLite settings table.
#[derive(Clone)]
pub struct SqliteUserStorage {
    db: Database,
}

impl SqliteUserStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStorage for SqliteUserStorage {
    async fn load(&self) -> Option<UserSession> {
        let raw = match self
            .db
            .run_blocking(|db| db.get_setting(USER_STORAGE_KEY))
            .await
        {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session, treating as signed out");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable stored session");
                None
            }
        }
    }

    async fn save(&self, user: &UserSession) -> Result<()> {
        let raw = serde_json::to_string(user)?;
        self.db
            .run_blocking(move |db| db.set_setting(USER_STORAGE_KEY, &raw))
            .await?;
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.db
            .run_blocking(|db| db.delete_setting(USER_STORAGE_KEY))
            .await?;
        Ok(())
    }
}

/// [`UserStorage`] that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryUserStorage {
    user: Mutex<Option<UserSession>>,
}

impl MemoryUserStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn load(&self) -> Option<UserSession> {
        self.user.lock().clone()
    }

    async fn save(&self, user: &UserSession) -> Result<()> {
        *self.user.lock() = Some(user.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.user.lock().take();
        Ok(())
    }
}
