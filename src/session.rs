//! Signed-in member sessions
//!
//! A [`MemberSession`] is created once at sign-in, looked up from the
//! session cookie on every request and passed explicitly to whatever
//! needs the current member. Sign-out removes it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::state::document::current_timestamp;
use crate::state::Member;

const SESSION_TTL_SECS: u64 = 86400;

/// Who the identity provider says signed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable provider subject
    pub id: String,
    pub display_name: String,
}

/// Session data for a signed-in member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSession {
    pub member_id: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: u64,
    pub expires_at: u64,
}

impl MemberSession {
    /// Create a new session with 24-hour expiry
    pub fn new(member: &Member) -> Self {
        let now = current_timestamp();
        Self {
            member_id: member.id.clone(),
            display_name: member.display_name.clone(),
            is_admin: member.is_admin,
            created_at: now,
            expires_at: now + SESSION_TTL_SECS,
        }
    }

    pub fn is_expired(&self) -> bool {
        current_timestamp() >= self.expires_at
    }
}

/// Session store - maps session tokens to session data
pub struct SessionStore {
    sessions: RwLock<HashMap<String, MemberSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session and return the token
    pub async fn create_session(&self, session: MemberSession) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// Get session by token (returns None if expired or not found)
    pub async fn get_session(&self, token: &str) -> Option<MemberSession> {
        let sessions = self.sessions.read().await;
        sessions.get(token).filter(|s| !s.is_expired()).cloned()
    }

    pub async fn remove_session(&self, token: &str) -> Option<MemberSession> {
        self.sessions.write().await.remove(token)
    }

    /// Drop expired sessions; returns how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        before - sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

pub fn create_session_store() -> SharedSessionStore {
    Arc::new(SessionStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> Member {
        Member::new("u1".to_string(), "Ana".to_string(), 1000)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = SessionStore::new();
        let token = store.create_session(MemberSession::new(&member())).await;

        let session = store.get_session(&token).await.unwrap();
        assert_eq!(session.member_id, "u1");
        assert!(!session.is_admin);

        store.remove_session(&token).await;
        assert!(store.get_session(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_hidden_and_cleaned() {
        let store = SessionStore::new();
        let mut session = MemberSession::new(&member());
        session.expires_at = session.created_at.saturating_sub(1);
        let token = store.create_session(session).await;

        assert!(store.get_session(&token).await.is_none());
        assert_eq!(store.cleanup_expired().await, 1);
    }
}
