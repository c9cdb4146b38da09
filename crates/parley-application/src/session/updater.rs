//! Session updater.
//!
//! `SessionUpdater` is the single write path for sessions: it wraps the
//! "find → transform → stamp → save" cycle and serializes it so that two
//! transformations never interleave.

use async_trait::async_trait;
use parley_core::error::{ParleyError, Result};
use parley_core::session::{Session, SessionMutation, SessionRepository, SessionStore};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Applies functional session transformations against a repository.
///
/// `SessionUpdater` encapsulates the pattern of:
/// 1. Loading the latest session from storage
/// 2. Applying a pure transformation
/// 3. Updating the timestamp
/// 4. Saving back to storage
pub struct SessionUpdater {
    repository: Arc<dyn SessionRepository>,
    write_lock: Mutex<()>,
}

impl SessionUpdater {
    /// Creates a new `SessionUpdater` with the given repository.
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            repository,
            write_lock: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repository
    }

    /// Persists a brand-new session.
    pub async fn create(&self, session: &Session) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.repository.save(session).await
    }
}

#[async_trait]
impl SessionStore for SessionUpdater {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        self.repository.find_by_id(session_id).await
    }

    /// Updates a session by applying the given transformation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session doesn't exist
    /// - Saving to storage fails
    async fn update_session(&self, session_id: &str, mutate: SessionMutation) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let session = self
            .repository
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| ParleyError::not_found("Session", session_id))?;

        let Some(mut session) = mutate(session) else {
            tracing::debug!(
                "[SessionUpdater] Mutation for session {} was a no-op",
                session_id
            );
            return Ok(());
        };

        session.updated_at = chrono::Utc::now().to_rfc3339();
        self.repository.save(&session).await?;

        tracing::debug!(
            "[SessionUpdater] Session saved: id={}, messages={}",
            session.id,
            session.messages.len()
        );
        Ok(())
    }
}
