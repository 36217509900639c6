//! Session state as seen by screens

use ignite_api::UserSession;
use serde::{Deserialize, Serialize};

/// Session state machine.
///
/// ```text
/// Bootstrapping
///   ↓ restore (exactly once)
/// Authenticated ⇄ Unauthenticated
///   sign in / sign up  →  Authenticated
///   sign out           →  Unauthenticated
///   profile update     →  Authenticated (merged on success, unchanged on failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Bootstrapping,
    Authenticated,
    Unauthenticated,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Bootstrapping => "bootstrapping",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of the session. `user` is `None` iff the device is logged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<UserSession>,
    /// True during restore and while a mutation is in flight
    pub loading: bool,
    restored: bool,
}

impl AuthState {
    pub(crate) fn bootstrapping() -> Self {
        Self {
            user: None,
            loading: true,
            restored: false,
        }
    }

    pub(crate) fn settled(user: Option<UserSession>) -> Self {
        Self {
            user,
            loading: false,
            restored: true,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.restored, &self.user) {
            (false, _) => SessionPhase::Bootstrapping,
            (true, Some(_)) => SessionPhase::Authenticated,
            (true, None) => SessionPhase::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    /// Whether route guards should send the user to the sign-in screen.
    pub fn needs_sign_in(&self) -> bool {
        !self.loading && self.restored && self.user.is_none()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::bootstrapping()
    }
}

/// How a mutation issued while another is in flight is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    /// Wait in FIFO order behind the in-flight mutation; the last issued wins
    #[default]
    Queue,
    /// Fail immediately with `SessionError::Busy`
    RejectWhenBusy,
}

/// Partial profile change sent to `PUT /users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
}

impl ProfileUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_password(
        mut self,
        old_password: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.old_password = Some(old_password.into());
        self.password = Some(password.into());
        self
    }

    /// The session after this update has been confirmed by the server.
    pub(crate) fn apply_to(&self, user: &UserSession) -> UserSession {
        let mut updated = user.clone();
        if let Some(name) = &self.name {
            updated.name.clone_from(name);
        }
        updated
    }
}
