//! Sign-in gate consumed before the first workspace load.
//!
//! Credential handling lives with the embedding application; the engine only
//! asks whether a session exists.

use async_trait::async_trait;

/// Signed-in user as reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, or `None` when the login screen should be shown.
    async fn current_session(&self) -> Option<UserSession>;
}

/// Single-user provider for local databases (CLI, offline use).
#[derive(Debug, Clone)]
pub struct LocalAuth {
    session: UserSession,
}

impl LocalAuth {
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            session: UserSession {
                email: format!("{user_id}@localhost"),
                user_id,
            },
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn current_session(&self) -> Option<UserSession> {
        Some(self.session.clone())
    }
}
