//! Application container
//!
//! Built once at startup. Everything a screen needs hangs off [`App`].

use std::sync::Arc;

use ignite_api::{Catalog, HttpGateway};
use ignite_session::{AuthState, SessionStore, SqliteUserStorage};
use ignite_storage::Database;

use crate::config::Config;
use crate::Result;

#[derive(Clone)]
pub struct App {
    config: Config,
    db: Database,
    gateway: Arc<HttpGateway>,
    catalog: Catalog,
    session: Arc<SessionStore>,
}

impl App {
    /// Open the database and build the gateway, catalog and session store.
    pub fn new(config: Config) -> Result<Self> {
        // Ensure data directory exists
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        let gateway = Arc::new(HttpGateway::new(&config.api_config())?);
        let catalog = Catalog::new(Arc::clone(&gateway));

        let storage = Arc::new(SqliteUserStorage::new(db.clone()));
        let session = SessionStore::new(Arc::clone(&gateway), storage)
            .with_policy(config.mutation_policy)
            .with_logout_path(config.logout_path.clone());

        tracing::info!(
            api = %gateway.base_url(),
            database = %config.database_path.display(),
            policy = ?config.mutation_policy,
            "App created"
        );

        Ok(Self {
            config,
            db,
            gateway,
            catalog,
            session: Arc::new(session),
        })
    }

    /// Restore the persisted session. Call before the first screen renders.
    pub async fn initialize(&self) -> AuthState {
        let state = self.session.restore().await;
        tracing::info!(phase = %state.phase(), "App initialized");
        state
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn gateway(&self) -> &Arc<HttpGateway> {
        &self.gateway
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
