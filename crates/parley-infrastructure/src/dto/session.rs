//! Session DTOs.

use parley_core::persona::Persona;
use parley_core::session::{Attachment, GenerationSettings, Message, MessageRole, Session};
use parley_core::{ParleyError, Result};
use serde::{Deserialize, Serialize};

/// Schema version written into every session file.
pub const SESSION_SCHEMA_VERSION: &str = "1.0.0";

fn default_schema_version() -> String {
    SESSION_SCHEMA_VERSION.to_string()
}

/// On-disk form of a message.
///
/// TOML has no null, so grounding metadata travels as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: String,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_audio_buffers: Option<Vec<String>>,
}

impl TryFrom<&Message> for MessageDto {
    type Error = ParleyError;

    fn try_from(message: &Message) -> Result<Self> {
        let grounding_metadata_json = message
            .grounding_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            attachments: message.attachments.clone(),
            timestamp: message.timestamp.clone(),
            is_streaming: message.is_streaming,
            character_name: message.character_name.clone(),
            grounding_metadata_json,
            cached_audio_buffers: message.cached_audio_buffers.clone(),
        })
    }
}

impl TryFrom<MessageDto> for Message {
    type Error = ParleyError;

    fn try_from(dto: MessageDto) -> Result<Self> {
        let grounding_metadata = dto
            .grounding_metadata_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Self {
            id: dto.id,
            role: dto.role,
            content: dto.content,
            attachments: dto.attachments,
            timestamp: dto.timestamp,
            is_streaming: dto.is_streaming,
            character_name: dto.character_name,
            grounding_metadata,
            cached_audio_buffers: dto.cached_audio_buffers,
        })
    }
}

/// On-disk form of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDto {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub model: String,
    #[serde(default)]
    pub persona_mode: bool,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub messages: Vec<MessageDto>,
}

impl TryFrom<&Session> for SessionDto {
    type Error = ParleyError;

    fn try_from(session: &Session) -> Result<Self> {
        let messages = session
            .messages
            .iter()
            .map(MessageDto::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema_version: SESSION_SCHEMA_VERSION.to_string(),
            id: session.id.clone(),
            title: session.title.clone(),
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
            model: session.model.clone(),
            persona_mode: session.persona_mode,
            settings: session.settings.clone(),
            personas: session.personas.clone(),
            messages,
        })
    }
}

impl TryFrom<SessionDto> for Session {
    type Error = ParleyError;

    fn try_from(dto: SessionDto) -> Result<Self> {
        if dto.schema_version != SESSION_SCHEMA_VERSION {
            tracing::warn!(
                "[SessionDto] Session {} has schema {}, reading as {}",
                dto.id,
                dto.schema_version,
                SESSION_SCHEMA_VERSION
            );
        }

        let messages = dto
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: dto.id,
            title: dto.title,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
            model: dto.model,
            settings: dto.settings,
            messages,
            personas: dto.personas,
            persona_mode: dto.persona_mode,
        })
    }
}
