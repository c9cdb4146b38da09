//! In-memory completion context cache.

use async_trait::async_trait;
use parley_core::context_cache::{ContextCache, ContextKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds opaque context handles keyed by [`ContextKey`].
///
/// Backends that keep server-side chat state store their handle here; the
/// control plane only ever invalidates.
#[derive(Clone, Default)]
pub struct MemoryContextCache {
    entries: Arc<RwLock<HashMap<ContextKey, String>>>,
}

impl MemoryContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a context handle under `key`, replacing any previous one.
    pub async fn insert(&self, key: ContextKey, handle: impl Into<String>) {
        self.entries.write().await.insert(key, handle.into());
    }

    pub async fn get(&self, key: &ContextKey) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &ContextKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every cached context.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl ContextCache for MemoryContextCache {
    async fn invalidate(&self, key: &ContextKey) {
        if self.entries.write().await.remove(key).is_some() {
            tracing::debug!(
                "[MemoryContextCache] Invalidated context for session {} (persona: {:?})",
                key.session_id,
                key.persona_id
            );
        }
    }
}
