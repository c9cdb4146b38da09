//! Session repository and store traits.

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for managing session persistence.
///
/// This trait defines the contract for persisting and retrieving sessions,
/// decoupling the control plane from the specific storage mechanism
/// (e.g., TOML files, in-memory map, remote API).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Saves a session to storage, replacing any previous version.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Deletes a session from storage. Deleting a missing session succeeds.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists all stored sessions.
    async fn list_all(&self) -> Result<Vec<Session>>;
}

/// A pure transformation applied to the latest stored session.
///
/// Returning `None` leaves the stored session untouched.
pub type SessionMutation = Box<dyn FnOnce(Session) -> Option<Session> + Send>;

/// The single entry point through which the control plane mutates sessions.
///
/// Implementations must apply `mutate` to the latest persisted state and must
/// not interleave two mutations of the same session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads the latest persisted session.
    async fn load(&self, session_id: &str) -> Result<Option<Session>>;

    /// Applies `mutate` to the latest session and persists the result.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist, or the storage error.
    async fn update_session(&self, session_id: &str, mutate: SessionMutation) -> Result<()>;
}
