//! Completion service port.
//!
//! The control plane never talks to a network API directly. It hands a fully
//! built request to a [`CompletionClient`] together with a cancellation token
//! and interprets the result.

use crate::persona::Persona;
use crate::session::{Attachment, GenerationSettings, Message, SettingsOverride};
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A request for one model turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub session_id: String,
    pub model: String,
    /// The user prompt for this turn (may be empty for persona-initiated turns)
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    /// Conversation preceding the prompt
    pub history: Vec<Message>,
    pub settings: GenerationSettings,
    /// Persona instruction replacing the session system instruction
    pub system_instruction_override: Option<String>,
    pub settings_override: Option<SettingsOverride>,
    /// Persona roster of the session, for multi-persona prompt construction
    pub personas: Vec<Persona>,
    /// Text the response must continue from; the client returns only the continuation
    pub response_prefix: Option<String>,
}

/// The aggregated result of a completed stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub grounding_metadata: Option<serde_json::Value>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding_metadata: None,
        }
    }
}

/// A request asking the service to write the user's next turn.
#[derive(Debug, Clone)]
pub struct MimicRequest {
    pub session_id: String,
    pub model: String,
    /// Role-flipped history: the user's turns appear as model turns
    pub history: Vec<Message>,
    pub persona_instruction: Option<String>,
    pub settings: GenerationSettings,
    pub overrides: SettingsOverride,
}

/// Errors returned by a completion client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The request observed its cancellation token
    #[error("Request cancelled")]
    Cancelled,

    /// The service rejected or failed the request
    #[error("{message}")]
    Service { message: String },

    /// The request could not reach the service
    #[error("Transport error: {0}")]
    Transport(String),
}

impl CompletionError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// True when the error only reports a user cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Client for the external completion service.
///
/// Implementations should watch `cancel` and stop producing effects once it
/// fires. The control plane discards any result that arrives after
/// cancellation regardless.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Streams one model turn and returns the aggregated response.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(response))`: the stream produced a final response
    /// - `Ok(None)`: the stream ended without a response or an error
    /// - `Err(_)`: the request failed or was cancelled
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<Option<CompletionResponse>, CompletionError>;

    /// Single-shot request that returns text written as the user.
    async fn mimic_user(
        &self,
        request: MimicRequest,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError>;
}
