//! Connection to session context map

use super::context::SessionContext;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Unique session (connection) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A session context behind its run lock.
///
/// Holding the lock is what entitles a pipeline run to mutate the context,
/// so at most one run touches a session at a time.
pub type SharedSession = Arc<tokio::sync::Mutex<SessionContext>>;

/// All live sessions
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context for a newly accepted connection
    pub fn create(&self) -> (SessionId, SharedSession) {
        let id = SessionId::new();
        let session = Arc::new(tokio::sync::Mutex::new(SessionContext::new()));
        self.sessions.write().insert(id, session.clone());
        tracing::debug!("Session {} created", id);
        (id, session)
    }

    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        self.sessions.read().get(&id).cloned()
    }

    /// Release a session; returns whether it existed
    pub fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Session {} released", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = SessionStore::new();
        let (id, session) = store.create();
        assert_eq!(store.len(), 1);

        session.lock().await.push_user("hello");
        let fetched = store.get(id).unwrap();
        assert_eq!(fetched.lock().await.conversation_history().len(), 1);

        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert!(store.is_empty());
        assert!(store.get(id).is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_distinct() {
        let store = SessionStore::new();
        let (a, session_a) = store.create();
        let (b, session_b) = store.create();
        assert_ne!(a, b);

        session_a.lock().await.push_user("only in a");
        assert!(session_b.lock().await.conversation_history().is_empty());
        assert_ne!(
            session_a.lock().await.conversation_id().to_string(),
            session_b.lock().await.conversation_id().to_string()
        );
        assert_eq!(store.ids().len(), 2);
    }
}
