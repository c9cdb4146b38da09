//! The four shapes of "produce one generation".

use parley_core::session::{Attachment, Message};

/// Parameters of a new user turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendRequest {
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    /// Replaces the session's message list before the new turn is appended
    pub history_override: Option<Vec<Message>>,
    /// Persona the model answers as
    pub persona_id: Option<String>,
    /// With a persona, the prompt is sent once and not kept as a user message
    pub temporary_context: bool,
}

impl SendRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_history_override(mut self, history: Vec<Message>) -> Self {
        self.history_override = Some(history);
        self
    }

    pub fn with_persona(mut self, persona_id: impl Into<String>) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    pub fn temporary(mut self) -> Self {
        self.temporary_context = true;
        self
    }
}

/// What a single generation produces.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationKind {
    /// A user turn followed by a model answer
    NewTurn(SendRequest),
    /// A model answer to the trailing user message
    Continuation,
    /// A fresh answer written over an existing model or error message,
    /// optionally continuing from a fixed prefix
    Regeneration {
        target_id: String,
        prefix: Option<String>,
    },
    /// The service writes the user's next turn
    MimicTurn,
}

impl GenerationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NewTurn(_) => "new_turn",
            Self::Continuation => "continuation",
            Self::Regeneration { prefix: None, .. } => "regeneration",
            Self::Regeneration { prefix: Some(_), .. } => "continue_prefix",
            Self::MimicTurn => "mimic_turn",
        }
    }
}

/// How a generation request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The message was finalized with generated content.
    Completed { message_id: String },
    /// The message was finalized as an error.
    Failed { message_id: String, error: String },
    /// The caller cancelled; the session was rolled back.
    Cancelled,
    /// A precondition did not hold; nothing changed.
    Skipped,
}

impl GenerationOutcome {
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Completed { message_id } | Self::Failed { message_id, .. } => Some(message_id),
            Self::Cancelled | Self::Skipped => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
