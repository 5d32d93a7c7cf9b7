//! Shared-secret authentication gate
//!
//! Session state is held behind the [`SessionStore`] trait so the gate and
//! the router can be exercised against an in-memory store or a mock. Nothing
//! is persisted: a restart forgets every authenticated user.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Per-user conversation flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserSession {
    /// The user has sent the correct secret during this process lifetime
    pub authenticated: bool,
    /// `/start` was sent and the next message is treated as a code attempt
    pub awaiting_code: bool,
}

/// Storage for user sessions keyed by Telegram user id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, or a default one for unknown users
    async fn session(&self, user_id: i64) -> UserSession;
    /// Mark the user as authenticated and clear any pending challenge
    async fn set_authenticated(&self, user_id: i64);
    /// Open or close the code challenge for the user
    async fn set_awaiting_code(&self, user_id: i64, awaiting: bool);
    /// Number of users with a stored session
    async fn session_count(&self) -> usize;
}

/// Process-local session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<i64, UserSession>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session(&self, user_id: i64) -> UserSession {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    async fn set_authenticated(&self, user_id: i64) {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(user_id).or_default();
        entry.authenticated = true;
        entry.awaiting_code = false;
    }

    async fn set_awaiting_code(&self, user_id: i64, awaiting: bool) {
        self.sessions
            .write()
            .await
            .entry(user_id)
            .or_default()
            .awaiting_code = awaiting;
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Checks and grants access based on a shared secret
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn SessionStore>,
    secret: String,
}

impl AuthGate {
    /// Create a gate over `store` that accepts exactly `secret`
    pub fn new(store: Arc<dyn SessionStore>, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }

    /// Whether the user already passed the challenge
    pub async fn is_authenticated(&self, user_id: i64) -> bool {
        self.store.session(user_id).await.authenticated
    }

    /// Grant access for the rest of the process lifetime. Idempotent.
    pub async fn grant(&self, user_id: i64) {
        if !self.is_authenticated(user_id).await {
            info!(user_id, "User passed the secret code challenge");
        }
        self.store.set_authenticated(user_id).await;
    }

    /// Exact comparison against the configured secret
    #[must_use]
    pub fn verify_code(&self, candidate: &str) -> bool {
        candidate == self.secret
    }

    /// Underlying session store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}
