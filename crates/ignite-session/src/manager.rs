//! Session Store
//!
//! Owns the authoritative in-memory session and orchestrates the API and
//! local storage. Order for every mutation: server first, then storage, then
//! memory and listeners. A failure at any step leaves memory and storage as
//! they were before the call.

use parking_lot::RwLock;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use url::Url;

use ignite_api::{ApiError, AvatarUpload, HttpGateway, RequestBody, SignInResponse, UserSession};

use crate::error::SessionError;
use crate::session::{AuthState, MutationPolicy, ProfileUpdate, SessionPhase};
use crate::storage::UserStorage;
use crate::Result;

type Listener = Arc<dyn Fn(&AuthState) + Send + Sync>;

/// Handle returned by [`SessionStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewAccount<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AvatarResponse {
    avatar: String,
}

pub struct SessionStore {
    gateway: Arc<HttpGateway>,
    storage: Arc<dyn UserStorage>,
    /// Current snapshot, readable without awaiting
    state: RwLock<AuthState>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    /// Held for the whole of restore and of every mutation
    mutation_lock: Mutex<()>,
    policy: MutationPolicy,
    /// Remote logout endpoint, called best-effort after the local clear
    logout_path: Option<String>,
}

/// Keeps the mutation slot and clears `loading` however the mutation ends.
struct Mutation<'a> {
    store: &'a SessionStore,
    _slot: MutexGuard<'a, ()>,
}

impl Drop for Mutation<'_> {
    fn drop(&mut self) {
        self.store.state.write().loading = false;
    }
}

impl SessionStore {
    pub fn new(gateway: Arc<HttpGateway>, storage: Arc<dyn UserStorage>) -> Self {
        Self {
            gateway,
            storage,
            state: RwLock::new(AuthState::bootstrapping()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            mutation_lock: Mutex::new(()),
            policy: MutationPolicy::default(),
            logout_path: None,
        }
    }

    pub fn with_policy(mut self, policy: MutationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_logout_path(mut self, logout_path: Option<String>) -> Self {
        self.logout_path = logout_path;
        self
    }

    /// Current snapshot.
    pub fn current(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.read().phase()
    }

    /// Resolved URL of the signed-in user's avatar, if they have one.
    pub fn avatar_url(&self) -> Option<Url> {
        let state = self.state.read();
        let file_name = state.user.as_ref()?.avatar_path.as_deref()?;
        self.gateway.avatar_url(file_name).ok()
    }

    /// Register a listener for settled state transitions.
    ///
    /// Listeners run once per completed transition with the post-transition
    /// state, in transition order. Failed mutations do not notify.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Rebuild the session from local storage. Runs once per store; later
    /// calls return the current state untouched. Never fails.
    pub async fn restore(&self) -> AuthState {
        let _slot = self.mutation_lock.lock().await;

        if self.phase() != SessionPhase::Bootstrapping {
            tracing::warn!("Session already restored, ignoring restore request");
            return self.current();
        }

        let user = self.storage.load().await;

        tracing::info!(
            user_id = user.as_ref().map(|u| u.id.as_str()),
            authenticated = user.is_some(),
            "Restored session"
        );

        self.commit(user)
    }

    /// Authenticate with `POST /sessions` and replace the session wholesale.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserSession> {
        let _mutation = self.begin().await?;

        let user = self.authenticate(email, password).await?;
        self.storage.save(&user).await?;
        self.commit(Some(user.clone()));

        tracing::info!(user_id = %user.id, "Signed in");

        Ok(user)
    }

    /// Create an account with `POST /users`, then sign in with it.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserSession> {
        let _mutation = self.begin().await?;

        let account = NewAccount {
            name,
            email,
            password,
        };
        self.gateway
            .post::<IgnoredAny>("/users", Some(RequestBody::json(&account)?), None)
            .await?;

        tracing::info!("Account created");

        let user = self.authenticate(email, password).await?;
        self.storage.save(&user).await?;
        self.commit(Some(user.clone()));

        tracing::info!(user_id = %user.id, "Signed in after sign up");

        Ok(user)
    }

    /// Clear the session locally, then tell the server in the background.
    ///
    /// Memory is cleared and listeners notified even when removing the stored
    /// record fails; that storage error is still returned.
    pub async fn sign_out(&self) -> Result<()> {
        let _mutation = self.begin().await?;

        let signed_in = self.state.read().user.clone();
        let removed = self.storage.remove().await;

        if let Some(user) = signed_in {
            self.commit(None);
            tracing::info!(user_id = %user.id, "Signed out");
        } else {
            tracing::debug!("Sign out requested with no signed-in user");
        }

        self.spawn_remote_logout();

        removed.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to remove stored session");
        })
    }

    /// Send a profile change with `PUT /users`; merge it once confirmed.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserSession> {
        let _mutation = self.begin().await?;
        let user = self.signed_in_user()?;

        self.gateway
            .put::<IgnoredAny>("/users", Some(RequestBody::json(&update)?), None)
            .await?;

        let updated = update.apply_to(&user);
        self.storage.save(&updated).await?;
        self.commit(Some(updated.clone()));

        tracing::info!(user_id = %updated.id, "Profile updated");

        Ok(updated)
    }

    /// Upload a new avatar with `PATCH /users/avatar`; merge the returned
    /// file name once confirmed.
    pub async fn update_avatar(&self, upload: AvatarUpload) -> Result<UserSession> {
        let _mutation = self.begin().await?;
        let user = self.signed_in_user()?;

        let size = upload.size_bytes();
        let response: AvatarResponse = self
            .gateway
            .patch("/users/avatar", Some(upload.into_body()?), None)
            .await?;

        let mut updated = user;
        updated.avatar_path = Some(response.avatar);
        self.storage.save(&updated).await?;
        self.commit(Some(updated.clone()));

        tracing::info!(user_id = %updated.id, bytes = size, "Avatar updated");

        Ok(updated)
    }

    /// Claim the mutation slot per the configured policy and mark loading.
    async fn begin(&self) -> Result<Mutation<'_>> {
        let slot = match self.policy {
            MutationPolicy::Queue => self.mutation_lock.lock().await,
            MutationPolicy::RejectWhenBusy => self.mutation_lock.try_lock().map_err(|_| {
                tracing::debug!("Rejecting session mutation, another one is in flight");
                SessionError::Busy
            })?,
        };

        if self.phase() == SessionPhase::Bootstrapping {
            return Err(SessionError::NotRestored);
        }

        self.state.write().loading = true;

        Ok(Mutation {
            store: self,
            _slot: slot,
        })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserSession> {
        let credentials = Credentials { email, password };
        let response: SignInResponse = self
            .gateway
            .post("/sessions", Some(RequestBody::json(&credentials)?), None)
            .await?;

        response.user.ok_or_else(|| {
            SessionError::Api(ApiError::Unknown(
                "sign-in response did not include a user".to_string(),
            ))
        })
    }

    fn signed_in_user(&self) -> Result<UserSession> {
        self.state
            .read()
            .user
            .clone()
            .ok_or(SessionError::NotAuthenticated)
    }

    /// Publish a settled state and notify listeners.
    fn commit(&self, user: Option<UserSession>) -> AuthState {
        let state = AuthState::settled(user);
        *self.state.write() = state.clone();

        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(&state);
        }

        state
    }

    fn spawn_remote_logout(&self) {
        let Some(path) = self.logout_path.clone() else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);

        tokio::spawn(async move {
            if let Err(e) = gateway.post::<IgnoredAny>(&path, None, None).await {
                tracing::warn!(error = %e, "Remote logout failed, local session already cleared");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryUserStorage, SqliteUserStorage, USER_STORAGE_KEY};
    use ignite_api::ApiConfig;
    use ignite_storage::Database;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ana() -> UserSession {
        UserSession {
            id: "1".to_string(),
            name: "Ana".to_string(),
            email: "a@a.com".to_string(),
            avatar_path: None,
        }
    }

    fn ana_json() -> serde_json::Value {
        json!({ "id": "1", "name": "Ana", "email": "a@a.com" })
    }

    struct Harness {
        store: Arc<SessionStore>,
        db: Database,
        storage: SqliteUserStorage,
        events: Arc<parking_lot::Mutex<Vec<AuthState>>>,
    }

    fn harness(uri: &str, policy: MutationPolicy, logout_path: Option<&str>) -> Harness {
        let db = Database::open_in_memory().unwrap();
        let storage = SqliteUserStorage::new(db.clone());
        let gateway = Arc::new(HttpGateway::new(&ApiConfig::new(uri)).unwrap());

        let store = SessionStore::new(gateway, Arc::new(storage.clone()))
            .with_policy(policy)
            .with_logout_path(logout_path.map(str::to_string));

        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(move |state: &AuthState| sink.lock().push(state.clone()));

        Harness {
            store: Arc::new(store),
            db,
            storage,
            events,
        }
    }

    async fn mount_sign_in(server: &MockServer, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "user": ana_json(), "token": "t" }))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_restore_without_stored_user() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);

        assert_eq!(h.store.phase(), SessionPhase::Bootstrapping);
        assert!(h.store.current().loading);

        let state = h.store.restore().await;
        assert_eq!(state.phase(), SessionPhase::Unauthenticated);
        assert!(!state.loading);
        assert_eq!(h.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_stored_user() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();

        h.store.restore().await;

        let state = h.store.current();
        assert_eq!(state.phase(), SessionPhase::Authenticated);
        assert_eq!(state.user.unwrap().email, "a@a.com");
    }

    #[tokio::test]
    async fn test_restore_corrupt_record() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, "{\"id\": 1, \"na").unwrap();

        let state = h.store.restore().await;
        assert_eq!(state.phase(), SessionPhase::Unauthenticated);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_restore_runs_once() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);

        h.store.restore().await;
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();

        let state = h.store.restore().await;
        assert_eq!(state.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_before_restore() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);

        let err = h.store.sign_in("a@a.com", "123456").await.unwrap_err();
        assert!(matches!(err, SessionError::NotRestored));
        assert_eq!(h.store.phase(), SessionPhase::Bootstrapping);
    }

    #[tokio::test]
    async fn test_sign_in_persists_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(body_json(json!({ "email": "a@a.com", "password": "123456" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "user": ana_json(), "token": "t" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let user = h.store.sign_in("a@a.com", "123456").await.unwrap();

        let state = h.store.current();
        assert_eq!(state.phase(), SessionPhase::Authenticated);
        assert!(!state.loading);
        assert_eq!(state.user.as_ref(), Some(&user));

        let stored = h.storage.load().await.unwrap();
        assert_eq!(stored.id, user.id);
        assert_eq!(stored.email, user.email);

        let events = h.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], state);
    }

    #[tokio::test]
    async fn test_sign_in_rejected_by_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let err = h.store.sign_in("a@a.com", "wrong").await.unwrap_err();
        assert_eq!(
            err.api_error(),
            Some(&ApiError::Domain("Invalid credentials".to_string()))
        );

        let state = h.store.current();
        assert_eq!(state.phase(), SessionPhase::Unauthenticated);
        assert!(!state.loading);
        assert_eq!(h.storage.load().await, None);
        assert_eq!(h.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_response_without_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t" })))
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let err = h.store.sign_in("a@a.com", "123456").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Unknown(_))));
        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_json(
                json!({ "name": "Ana", "email": "a@a.com", "password": "123456" }),
            ))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        mount_sign_in(&server, Duration::ZERO).await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let user = h.store.sign_up("Ana", "a@a.com", "123456").await.unwrap();
        assert_eq!(user, ana());
        assert_eq!(h.store.phase(), SessionPhase::Authenticated);
        assert_eq!(h.storage.load().await, Some(ana()));
    }

    #[tokio::test]
    async fn test_sign_up_rejected_does_not_sign_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "Este e-mail já está em uso." })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": ana_json() })))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let err = h.store.sign_up("Ana", "a@a.com", "123456").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Este e-mail já está em uso."
        );
        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_sign_out_survives_remote_failure() {
        let server = MockServer::start().await;
        mount_sign_in(&server, Duration::ZERO).await;
        Mock::given(method("POST"))
            .and(path("/sessions/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, Some("/sessions/logout"));
        h.store.restore().await;
        h.store.sign_in("a@a.com", "123456").await.unwrap();

        h.store.sign_out().await.unwrap();

        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
        assert!(!h.store.current().loading);
        assert_eq!(h.storage.load().await, None);

        // Give the background logout time to fail; nothing comes back
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.storage.load().await, None);
        assert_eq!(h.events.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_sign_out_when_signed_out_is_quiet() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        h.store.sign_out().await.unwrap();
        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_clears_memory_when_storage_fails() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();
        h.store.restore().await;

        h.db.with_connection(|conn| {
            conn.execute_batch("DROP TABLE settings")?;
            Ok(())
        })
        .unwrap();

        let err = h.store.sign_out().await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
        assert!(!h.store.current().loading);
    }

    #[tokio::test]
    async fn test_update_profile_network_failure_leaves_session() {
        let server = MockServer::start().await;
        let uri = server.uri();
        let h = harness(&uri, MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();
        h.store.restore().await;

        // Nothing is listening anymore
        drop(server);

        let before = h.store.current().user;
        let err = h
            .store
            .update_profile(ProfileUpdate::name("Ana Maria"))
            .await
            .unwrap_err();

        assert_eq!(err.api_error(), Some(&ApiError::Network));
        assert_eq!(h.store.current().user, before);
        assert!(!h.store.current().loading);
        assert_eq!(h.storage.load().await, before);
        assert_eq!(h.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile_merges_after_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users"))
            .and(body_json(json!({
                "name": "Ana Maria",
                "password": "654321",
                "old_password": "123456"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();
        h.store.restore().await;

        let update = ProfileUpdate::name("Ana Maria").with_password("123456", "654321");
        let updated = h.store.update_profile(update).await.unwrap();

        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, "a@a.com");
        assert_eq!(h.store.current().user, Some(updated.clone()));
        assert_eq!(h.storage.load().await, Some(updated));
        assert_eq!(h.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_update_profile_requires_user() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let err = h
            .store
            .update_profile(ProfileUpdate::name("Ana"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotAuthenticated));
        assert!(!h.store.current().loading);
    }

    #[tokio::test]
    async fn test_update_profile_storage_failure_keeps_memory() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();
        h.store.restore().await;

        h.db.with_connection(|conn| {
            conn.execute_batch("DROP TABLE settings")?;
            Ok(())
        })
        .unwrap();

        let err = h
            .store
            .update_profile(ProfileUpdate::name("Ana Maria"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(h.store.current().user, Some(ana()));
    }

    #[tokio::test]
    async fn test_update_avatar() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/users/avatar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "name": "Ana",
                "email": "a@a.com",
                "avatar": "1-ana.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.db.set_setting(USER_STORAGE_KEY, &ana_json().to_string())
            .unwrap();
        h.store.restore().await;
        assert_eq!(h.store.avatar_url(), None);

        let upload = AvatarUpload::new("ana.png", "image/png", vec![7; 2048]).unwrap();
        let updated = h.store.update_avatar(upload).await.unwrap();

        assert_eq!(updated.avatar_path.as_deref(), Some("1-ana.png"));
        assert_eq!(h.storage.load().await, Some(updated));
        assert_eq!(
            h.store.avatar_url().unwrap().as_str(),
            format!("{}/avatar/1-ana.png", server.uri())
        );
    }

    #[tokio::test]
    async fn test_rejected_avatar_leaves_session() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/users/avatar"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "Formato de imagem inválido." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        let mut stored = ana();
        stored.avatar_path = Some("1-old.png".to_string());
        h.db.set_setting(USER_STORAGE_KEY, &serde_json::to_string(&stored).unwrap())
            .unwrap();
        h.store.restore().await;

        let upload = AvatarUpload::new("ana.bmp", "image/bmp", vec![7; 2048]).unwrap();
        let err = h.store.update_avatar(upload).await.unwrap_err();

        assert_eq!(
            err.api_error(),
            Some(&ApiError::Domain("Formato de imagem inválido.".to_string()))
        );
        assert_eq!(h.store.current().user, Some(stored.clone()));
        assert!(!h.store.current().loading);
        assert_eq!(h.storage.load().await, Some(stored));
        assert_eq!(
            h.store.avatar_url().unwrap().as_str(),
            format!("{}/avatar/1-old.png", server.uri())
        );
        assert_eq!(h.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_loading_visible_while_in_flight() {
        let server = MockServer::start().await;
        mount_sign_in(&server, Duration::from_millis(300)).await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let store = Arc::clone(&h.store);
        let task = tokio::spawn(async move { store.sign_in("a@a.com", "123456").await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let in_flight = h.store.current();
        assert!(in_flight.loading);
        assert_eq!(in_flight.phase(), SessionPhase::Unauthenticated);
        // Loading alone is not a notification
        assert_eq!(h.events.lock().len(), 1);

        task.await.unwrap().unwrap();
        assert!(!h.store.current().loading);
    }

    #[tokio::test]
    async fn test_queued_sign_out_wins_over_earlier_sign_in() {
        let server = MockServer::start().await;
        mount_sign_in(&server, Duration::from_millis(200)).await;

        let h = harness(&server.uri(), MutationPolicy::Queue, None);
        h.store.restore().await;

        let (signed_in, signed_out) =
            tokio::join!(h.store.sign_in("a@a.com", "123456"), h.store.sign_out());

        signed_in.unwrap();
        signed_out.unwrap();

        assert_eq!(h.store.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.storage.load().await, None);

        let phases: Vec<SessionPhase> = h.events.lock().iter().map(AuthState::phase).collect();
        assert_eq!(
            phases,
            vec![
                SessionPhase::Unauthenticated,
                SessionPhase::Authenticated,
                SessionPhase::Unauthenticated,
            ]
        );
    }

    #[tokio::test]
    async fn test_reject_when_busy() {
        let server = MockServer::start().await;
        mount_sign_in(&server, Duration::from_millis(200)).await;

        let h = harness(&server.uri(), MutationPolicy::RejectWhenBusy, None);
        h.store.restore().await;

        let (signed_in, signed_out) =
            tokio::join!(h.store.sign_in("a@a.com", "123456"), h.store.sign_out());

        signed_in.unwrap();
        assert!(matches!(signed_out, Err(SessionError::Busy)));

        let state = h.store.current();
        assert_eq!(state.user, Some(ana()));
        assert!(!state.loading);
        assert_eq!(h.storage.load().await, Some(ana()));
    }

    #[tokio::test]
    async fn test_ephemeral_storage() {
        let server = MockServer::start().await;
        mount_sign_in(&server, Duration::ZERO).await;

        let storage = Arc::new(MemoryUserStorage::new());
        let gateway = Arc::new(HttpGateway::new(&ApiConfig::new(server.uri())).unwrap());
        let store = SessionStore::new(gateway, storage.clone());

        store.restore().await;
        store.sign_in("a@a.com", "123456").await.unwrap();
        assert_eq!(storage.load().await, Some(ana()));

        store.sign_out().await.unwrap();
        assert_eq!(storage.load().await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let server = MockServer::start().await;
        let h = harness(&server.uri(), MutationPolicy::Queue, None);

        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = h.store.subscribe(move |_: &AuthState| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(h.store.unsubscribe(id));
        assert!(!h.store.unsubscribe(id));

        h.store.restore().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
