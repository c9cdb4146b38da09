//! Edit-and-resubmit of existing messages.
//!
//! An edit is either applied locally or turned into a new generation with a
//! reconstructed history.

use crate::generation::{GenerationOrchestrator, GenerationOutcome, SendRequest};
use parley_core::error::Result;
use parley_core::session::history::preceding_user_index;
use parley_core::session::{Attachment, MessageRole, Session, SessionStore};
use std::sync::Arc;

/// What to do with an edited message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Discard the edit, stopping the message's generation if it is streaming.
    Cancel,
    /// Replace the content without generating.
    SaveLocally,
    /// Replace the content and regenerate from this point.
    SaveAndSubmit,
    /// Keep the edited model text as a prefix and generate its continuation.
    ContinuePrefix,
}

/// An edit buffer for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEdit {
    pub session_id: String,
    pub message_id: String,
    pub content: String,
    /// New attachments for a user message; `None` keeps the current ones
    pub attachments: Option<Vec<Attachment>>,
}

impl MessageEdit {
    pub fn new(
        session_id: impl Into<String>,
        message_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: message_id.into(),
            content: content.into(),
            attachments: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Discarded,
    Saved,
    Generated(GenerationOutcome),
}

pub struct EditResubmitController {
    orchestrator: Arc<GenerationOrchestrator>,
}

impl EditResubmitController {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn apply(&self, edit: MessageEdit, action: EditAction) -> Result<EditOutcome> {
        tracing::debug!(
            "[EditResubmit] {:?} on message {} in session {}",
            action,
            edit.message_id,
            edit.session_id
        );

        match action {
            EditAction::Cancel => self.cancel(&edit).await,
            EditAction::SaveLocally => self.save_locally(edit).await,
            EditAction::SaveAndSubmit => self.save_and_submit(edit).await,
            EditAction::ContinuePrefix => self.continue_prefix(edit).await,
        }
    }

    fn store(&self) -> &Arc<dyn SessionStore> {
        self.orchestrator.store()
    }

    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        self.store().load(session_id).await
    }

    fn is_empty_edit(edit: &MessageEdit) -> bool {
        edit.content.trim().is_empty() && edit.attachments.as_ref().is_none_or(Vec::is_empty)
    }

    async fn cancel(&self, edit: &MessageEdit) -> Result<EditOutcome> {
        let streaming = self.load(&edit.session_id).await?.is_some_and(|session| {
            session
                .message(&edit.message_id)
                .is_some_and(|m| m.role == MessageRole::Model && m.is_streaming)
        });
        if streaming {
            self.orchestrator.cancel(&edit.session_id).await?;
        }
        Ok(EditOutcome::Discarded)
    }

    async fn save_locally(&self, edit: MessageEdit) -> Result<EditOutcome> {
        if edit.content.trim().is_empty() {
            return self.cancel(&edit).await;
        }

        let MessageEdit {
            session_id,
            message_id,
            content,
            ..
        } = edit;
        self.store()
            .update_session(
                &session_id,
                Box::new(move |mut session: Session| {
                    let edited = session.message(&message_id)?.with_content(content);
                    session.replace_message(edited);
                    Some(session)
                }),
            )
            .await?;
        Ok(EditOutcome::Saved)
    }

    async fn save_and_submit(&self, edit: MessageEdit) -> Result<EditOutcome> {
        if Self::is_empty_edit(&edit) {
            return self.cancel(&edit).await;
        }
        if self.orchestrator.is_generating(&edit.session_id) {
            return Ok(EditOutcome::Generated(GenerationOutcome::Skipped));
        }
        let Some(session) = self.load(&edit.session_id).await? else {
            return Ok(EditOutcome::Generated(GenerationOutcome::Skipped));
        };
        let Some(index) = session.index_of(&edit.message_id) else {
            return Ok(EditOutcome::Generated(GenerationOutcome::Skipped));
        };
        let edited = &session.messages[index];

        let request = match edited.role {
            MessageRole::User => {
                let attachments = edit
                    .attachments
                    .clone()
                    .unwrap_or_else(|| edited.attachments.clone());
                SendRequest::new(edit.content.clone())
                    .with_attachments(attachments)
                    .with_history_override(session.messages[..index].to_vec())
            }
            MessageRole::Model | MessageRole::Error => {
                let Some(user_index) = preceding_user_index(&session.messages, index) else {
                    return Ok(EditOutcome::Generated(GenerationOutcome::Skipped));
                };
                // The edited answer comes back as the user's next prompt.
                let history = session.messages[..=user_index].to_vec();
                SendRequest::new(edit.content.clone())
                    .with_attachments(edit.attachments.clone().unwrap_or_default())
                    .with_history_override(history)
            }
        };

        self.orchestrator.discard_generation_times(
            session.messages[index..].iter().map(|m| m.id.as_str()),
        );

        let outcome = self.orchestrator.send(&edit.session_id, request).await?;
        Ok(EditOutcome::Generated(outcome))
    }

    async fn continue_prefix(&self, edit: MessageEdit) -> Result<EditOutcome> {
        let is_model = self.load(&edit.session_id).await?.is_some_and(|session| {
            session
                .message(&edit.message_id)
                .is_some_and(|m| m.role == MessageRole::Model)
        });
        if !is_model {
            return Ok(EditOutcome::Generated(GenerationOutcome::Skipped));
        }

        let outcome = self
            .orchestrator
            .continue_from_prefix(&edit.session_id, &edit.message_id, edit.content)
            .await?;
        Ok(EditOutcome::Generated(outcome))
    }
}
