//! In-memory SessionRepository, used by tests and ephemeral runs.

use async_trait::async_trait;
use parley_core::Result;
use parley_core::session::{Session, SessionRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct MemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with `sessions`.
    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let map = sessions.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            sessions: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}
