//! Conversation message types.
//!
//! Messages are replaced, never mutated piecemeal by callers: the generation
//! control plane builds a new value and swaps it in by `id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message produced by the completion service.
    Model,
    /// Terminal failure of a generation, shown in the transcript.
    Error,
}

impl MessageRole {
    /// Returns true for roles that a regeneration may target.
    pub fn is_response(self) -> bool {
        matches!(self, Self::Model | Self::Error)
    }
}

/// Reference to an uploaded file. Opaque to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Identifier assigned by the upload pipeline
    pub id: String,
    /// Original file name
    pub name: String,
    /// MIME type reported by the upload pipeline
    pub mime_type: String,
    /// Remote or local location of the uploaded content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A single message in a conversation.
///
/// `id` is fixed at creation. Every other field may be replaced in place when
/// a generation finalizes, fails, or is rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (UUID format)
    pub id: String,
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message. Empty only while `is_streaming` is true.
    pub content: String,
    /// Attachments in upload order
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Creation or last content update time (RFC 3339).
    pub timestamp: String,
    /// True while this message is a generation placeholder
    #[serde(default)]
    pub is_streaming: bool,
    /// Display name of the persona that produced this message
    #[serde(default)]
    pub character_name: Option<String>,
    /// Search grounding payload returned by the completion service
    #[serde(default)]
    pub grounding_metadata: Option<serde_json::Value>,
    /// Audio cache owned by the speech collaborator
    #[serde(default)]
    pub cached_audio_buffers: Option<Vec<String>>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: now_timestamp(),
            is_streaming: false,
            character_name: None,
            grounding_metadata: None,
            cached_audio_buffers: None,
        }
    }

    /// Creates a finalized user message.
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::with_role(MessageRole::User, content)
        }
    }

    /// Creates a finalized model message.
    pub fn model(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Model, content)
    }

    /// Creates a streaming placeholder with the given role and no content.
    pub fn placeholder(role: MessageRole, character_name: Option<String>) -> Self {
        Self {
            is_streaming: true,
            character_name,
            ..Self::with_role(role, String::new())
        }
    }

    /// Returns a copy turned back into a streaming placeholder.
    ///
    /// The id is kept. Content is replaced by `prefix` (usually empty), and
    /// grounding and cached audio are dropped because they described the old
    /// content.
    pub fn to_placeholder(&self, prefix: &str) -> Self {
        Self {
            role: MessageRole::Model,
            content: prefix.to_string(),
            timestamp: now_timestamp(),
            is_streaming: true,
            grounding_metadata: None,
            cached_audio_buffers: None,
            ..self.clone()
        }
    }

    /// Returns a finalized copy carrying generated content.
    pub fn finalized(
        &self,
        role: MessageRole,
        content: String,
        grounding_metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            role,
            content,
            timestamp: now_timestamp(),
            is_streaming: false,
            grounding_metadata,
            cached_audio_buffers: None,
            ..self.clone()
        }
    }

    /// Returns a copy with edited content and invalidated audio.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: now_timestamp(),
            cached_audio_buffers: None,
            ..self.clone()
        }
    }
}

/// Generates a fresh message id.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
