//! Session domain model.
//!
//! This module contains the core Session entity that represents
//! a conversation in the application's domain layer.

use super::message::{Message, MessageRole, now_timestamp};
use super::settings::GenerationSettings;
use crate::persona::Persona;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to sessions that have not been named yet.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Represents a conversation in the application's domain layer.
///
/// A session contains:
/// - The ordered message list
/// - The model identifier and generation settings used for requests
/// - An optional roster of personas the model may speak as
/// - Timestamps for creation and last update
///
/// `messages` is append-ordered. The generation control plane only ever
/// appends, replaces one message by id, truncates to a prefix and appends, or
/// removes a placeholder by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Human-readable session title
    pub title: String,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
    /// Completion model identifier
    pub model: String,
    /// Generation settings for this session
    #[serde(default)]
    pub settings: GenerationSettings,
    /// Conversation messages in order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Personas available in this session
    #[serde(default)]
    pub personas: Vec<Persona>,
    /// Whether turns are attributed to personas from the roster
    #[serde(default)]
    pub persona_mode: bool,
}

impl Session {
    /// Creates an empty session with the default title.
    pub fn new(model: impl Into<String>, settings: GenerationSettings) -> Self {
        let now = now_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            created_at: now.clone(),
            updated_at: now,
            model: model.into(),
            settings,
            messages: Vec::new(),
            personas: Vec::new(),
            persona_mode: false,
        }
    }

    /// True when a persona roster is active.
    pub fn is_persona_mode(&self) -> bool {
        self.persona_mode && !self.personas.is_empty()
    }

    /// Position of the message with the given id.
    pub fn index_of(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    /// Looks up a message by id.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Replaces the message sharing `message.id`. Returns false when absent.
    pub fn replace_message(&mut self, message: Message) -> bool {
        match self.index_of(&message.id) {
            Some(index) => {
                self.messages[index] = message;
                true
            }
            None => false,
        }
    }

    /// Removes the message with the given id.
    pub fn remove_message(&mut self, message_id: &str) {
        self.messages.retain(|m| m.id != message_id);
    }

    /// True if any user message exists.
    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(|m| m.role == MessageRole::User)
    }

    /// Looks up a persona by id.
    pub fn persona(&self, persona_id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == persona_id)
    }

    /// Looks up a persona by display name.
    pub fn persona_by_name(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }
}

/// Derives a session title from the first prompt.
///
/// Prompts longer than `max_chars` characters are cut and suffixed with `...`.
/// An empty prompt with attachments gets `attachment_label`.
pub fn derive_title(
    prompt: &str,
    has_attachments: bool,
    max_chars: usize,
    attachment_label: &str,
) -> Option<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return has_attachments.then(|| attachment_label.to_string());
    }

    if prompt.chars().count() > max_chars {
        let cut: String = prompt.chars().take(max_chars).collect();
        Some(format!("{}...", cut))
    } else {
        Some(prompt.to_string())
    }
}
