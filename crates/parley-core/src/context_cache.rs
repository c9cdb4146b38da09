//! Cached completion context port.
//!
//! Completion backends may keep a server-side chat context per
//! (session, model, settings, persona). Regeneration and settings changes must
//! drop that context so a turn is not answered from stale state.

use crate::session::Session;
use async_trait::async_trait;

/// Identifies one cached completion context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub session_id: String,
    pub model: String,
    pub settings_fingerprint: String,
    pub persona_id: Option<String>,
}

impl ContextKey {
    /// Key for the session's current model and settings.
    pub fn for_session(session: &Session, persona_id: Option<&str>) -> Self {
        Self {
            session_id: session.id.clone(),
            model: session.model.clone(),
            settings_fingerprint: session.settings.fingerprint(),
            persona_id: persona_id.map(str::to_string),
        }
    }
}

/// External cache of completion contexts.
#[async_trait]
pub trait ContextCache: Send + Sync {
    /// Drops the context stored under `key`, if any.
    async fn invalidate(&self, key: &ContextKey);
}

/// A cache that holds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContextCache;

#[async_trait]
impl ContextCache for NoContextCache {
    async fn invalidate(&self, _key: &ContextKey) {}
}
