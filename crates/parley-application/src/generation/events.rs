//! Generation lifecycle events.

use serde::Serialize;

/// Published on the orchestrator's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Started {
        session_id: String,
        message_id: String,
        kind: &'static str,
    },
    Completed {
        session_id: String,
        message_id: String,
        elapsed_ms: u64,
    },
    Failed {
        session_id: String,
        message_id: String,
        error: String,
    },
    Cancelled {
        session_id: String,
        message_id: String,
    },
}

impl GenerationEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Started { session_id, .. }
            | Self::Completed { session_id, .. }
            | Self::Failed { session_id, .. }
            | Self::Cancelled { session_id, .. } => session_id,
        }
    }
}
