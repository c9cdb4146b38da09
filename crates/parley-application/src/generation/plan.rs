//! Turning a [`GenerationKind`] and the current session into one request.
//!
//! Planning is pure: it reads the session, decides whether the generation is
//! allowed, and describes the placeholder write and the service call. `None`
//! means a precondition failed and nothing should happen.

use super::context::{GenerationContext, Rollback};
use super::kind::{GenerationKind, SendRequest};
use parley_core::completion::{CompletionRequest, MimicRequest};
use parley_core::config::GenerationConfig;
use parley_core::context_cache::ContextKey;
use parley_core::session::history::{preceding_user_index, role_flipped};
use parley_core::session::{
    Message, MessageRole, Session, SessionMutation, SettingsOverride, derive_title,
};
use std::sync::Arc;

/// The external call a generation makes.
#[derive(Debug, Clone)]
pub(crate) enum ServiceCall {
    Complete(CompletionRequest),
    Mimic(MimicRequest),
}

/// Where the placeholder goes.
#[derive(Debug, Clone)]
pub(crate) enum Placement {
    /// Optionally swap in `base`, then append `user` (if any) and the placeholder.
    Append {
        base: Option<Vec<Message>>,
        user: Option<Message>,
        title: Option<String>,
    },
    /// Overwrite the message sharing the placeholder id.
    Overwrite,
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationPlan {
    pub placeholder: Message,
    pub placement: Placement,
    pub call: ServiceCall,
    /// Kept in front of the generated text on success
    pub prefix: Option<String>,
    pub success_role: MessageRole,
    pub invalidate: Option<ContextKey>,
}

impl GenerationPlan {
    /// Builds the placeholder write. The rollback is recorded on `ctx` from
    /// inside the mutation so it always describes the state actually replaced.
    pub(crate) fn placeholder_mutation(
        &self,
        ctx: Arc<GenerationContext>,
        default_title: String,
    ) -> SessionMutation {
        let placeholder = self.placeholder.clone();
        let placement = self.placement.clone();

        Box::new(move |mut session: Session| match placement {
            Placement::Append { base, user, title } => {
                let before = session.messages.clone();
                if let Some(base) = base {
                    session.messages = base;
                }
                if let Some(user) = user {
                    if session.title == default_title && !session.has_user_messages() {
                        if let Some(title) = title {
                            session.title = title;
                        }
                    }
                    session.messages.push(user);
                }
                ctx.set_rollback(Rollback::RestoreList {
                    placeholder_id: placeholder.id.clone(),
                    messages: before,
                });
                session.messages.push(placeholder);
                Some(session)
            }
            Placement::Overwrite => {
                let original = session.message(&placeholder.id)?.clone();
                session.replace_message(placeholder);
                ctx.set_rollback(Rollback::RestoreMessage(original));
                Some(session)
            }
        })
    }
}

/// Plans one generation. `message_id` is the id of the message to produce;
/// regenerations use their target id.
pub(crate) fn plan(
    session: &Session,
    kind: &GenerationKind,
    message_id: &str,
    config: &GenerationConfig,
) -> Option<GenerationPlan> {
    match kind {
        GenerationKind::NewTurn(request) => plan_new_turn(session, request, message_id, config),
        GenerationKind::Continuation => plan_continuation(session, message_id),
        GenerationKind::Regeneration { target_id, prefix } => {
            plan_regeneration(session, target_id, prefix.as_deref())
        }
        GenerationKind::MimicTurn => plan_mimic(session, message_id, config),
    }
}

fn completion_request(
    session: &Session,
    prompt: String,
    attachments: Vec<parley_core::session::Attachment>,
    history: Vec<Message>,
    persona_instruction: Option<String>,
) -> CompletionRequest {
    CompletionRequest {
        session_id: session.id.clone(),
        model: session.model.clone(),
        prompt,
        attachments,
        history,
        settings: session.settings.clone(),
        system_instruction_override: persona_instruction,
        settings_override: None,
        personas: if session.is_persona_mode() {
            session.personas.clone()
        } else {
            Vec::new()
        },
        response_prefix: None,
    }
}

fn placeholder_with_id(role: MessageRole, character_name: Option<String>, id: &str) -> Message {
    Message {
        id: id.to_string(),
        ..Message::placeholder(role, character_name)
    }
}

fn plan_new_turn(
    session: &Session,
    request: &SendRequest,
    message_id: &str,
    config: &GenerationConfig,
) -> Option<GenerationPlan> {
    let persona = request
        .persona_id
        .as_deref()
        .and_then(|id| session.persona(id));
    if request.persona_id.is_some() && persona.is_none() {
        tracing::warn!(
            "[GenerationOrchestrator] Unknown persona {:?} in session {}, answering without it",
            request.persona_id,
            session.id
        );
    }

    let has_content = !request.prompt.trim().is_empty() || !request.attachments.is_empty();
    let one_shot = request.temporary_context && request.persona_id.is_some();
    if !one_shot && !has_content && request.persona_id.is_none() {
        return None;
    }

    let user = (!one_shot && has_content)
        .then(|| Message::user(request.prompt.clone(), request.attachments.clone()));
    let title = user.as_ref().and_then(|_| {
        derive_title(
            &request.prompt,
            !request.attachments.is_empty(),
            config.title_max_chars,
            &config.attachment_title,
        )
    });

    let history = request
        .history_override
        .clone()
        .unwrap_or_else(|| session.messages.clone());

    Some(GenerationPlan {
        placeholder: placeholder_with_id(
            MessageRole::Model,
            persona.map(|p| p.name.clone()),
            message_id,
        ),
        placement: Placement::Append {
            base: request.history_override.clone(),
            user,
            title,
        },
        call: ServiceCall::Complete(completion_request(
            session,
            request.prompt.clone(),
            request.attachments.clone(),
            history,
            persona.map(|p| p.instruction()),
        )),
        prefix: None,
        success_role: MessageRole::Model,
        invalidate: None,
    })
}

fn plan_continuation(session: &Session, message_id: &str) -> Option<GenerationPlan> {
    if session.is_persona_mode() {
        return None;
    }
    let (last, preceding) = session.messages.split_last()?;
    if last.role != MessageRole::User {
        return None;
    }

    Some(GenerationPlan {
        placeholder: placeholder_with_id(MessageRole::Model, None, message_id),
        placement: Placement::Append {
            base: None,
            user: None,
            title: None,
        },
        call: ServiceCall::Complete(completion_request(
            session,
            last.content.clone(),
            last.attachments.clone(),
            preceding.to_vec(),
            None,
        )),
        prefix: None,
        success_role: MessageRole::Model,
        invalidate: None,
    })
}

fn plan_mimic(
    session: &Session,
    message_id: &str,
    config: &GenerationConfig,
) -> Option<GenerationPlan> {
    if session.is_persona_mode() {
        return None;
    }
    let last = session.messages.last()?;
    if !last.role.is_response() || last.is_streaming {
        return None;
    }

    Some(GenerationPlan {
        placeholder: placeholder_with_id(MessageRole::User, None, message_id),
        placement: Placement::Append {
            base: None,
            user: None,
            title: None,
        },
        call: ServiceCall::Mimic(MimicRequest {
            session_id: session.id.clone(),
            model: session.model.clone(),
            history: role_flipped(&session.messages),
            persona_instruction: session.settings.user_persona_instruction.clone(),
            settings: session.settings.clone(),
            overrides: SettingsOverride::role_mimic(config.mimic_safety_override),
        }),
        prefix: None,
        success_role: MessageRole::User,
        invalidate: None,
    })
}

fn plan_regeneration(
    session: &Session,
    target_id: &str,
    prefix: Option<&str>,
) -> Option<GenerationPlan> {
    let index = session.index_of(target_id)?;
    let target = &session.messages[index];
    if index == 0 || !target.role.is_response() || target.is_streaming {
        return None;
    }
    if prefix.is_some() && target.role != MessageRole::Model {
        return None;
    }

    let user_index = preceding_user_index(&session.messages, index)?;
    let user = &session.messages[user_index];

    let persona = target
        .character_name
        .as_deref()
        .and_then(|name| session.persona_by_name(name));

    let mut request = completion_request(
        session,
        user.content.clone(),
        user.attachments.clone(),
        session.messages[..user_index].to_vec(),
        persona.map(|p| p.instruction()),
    );
    request.response_prefix = prefix.map(str::to_string);

    Some(GenerationPlan {
        placeholder: target.to_placeholder(prefix.unwrap_or_default()),
        placement: Placement::Overwrite,
        call: ServiceCall::Complete(request),
        prefix: prefix.map(str::to_string),
        success_role: MessageRole::Model,
        invalidate: Some(ContextKey::for_session(
            session,
            persona.map(|p| p.id.as_str()),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::persona::Persona;
    use parley_core::session::GenerationSettings;

    fn session_with(messages: Vec<Message>) -> Session {
        let mut session = Session::new("test-model", GenerationSettings::default());
        session.messages = messages;
        session
    }

    fn send(prompt: &str) -> GenerationKind {
        GenerationKind::NewTurn(SendRequest::new(prompt))
    }

    #[test]
    fn test_empty_send_without_persona_is_skipped() {
        let session = session_with(Vec::new());
        let config = GenerationConfig::default();
        assert!(plan(&session, &send("   "), "m1", &config).is_none());
    }

    #[test]
    fn test_send_history_precedes_new_user_message() {
        let session = session_with(vec![
            Message::user("Hi", Vec::new()),
            Message::model("Hello!"),
        ]);
        let plan = plan(&session, &send("How are you?"), "m1", &GenerationConfig::default())
            .unwrap();

        let ServiceCall::Complete(request) = plan.call else {
            panic!("expected a completion call");
        };
        assert_eq!(request.prompt, "How are you?");
        assert_eq!(request.history, session.messages);
        assert_eq!(plan.placeholder.id, "m1");
        assert!(plan.placeholder.is_streaming);
    }

    #[test]
    fn test_temporary_persona_context_appends_no_user_message() {
        let mut session = session_with(Vec::new());
        session.personas.push(Persona::new("p1", "Ada", "You are Ada."));
        session.persona_mode = true;

        let kind = GenerationKind::NewTurn(
            SendRequest::new("Introduce yourself")
                .with_persona("p1")
                .temporary(),
        );
        let plan = plan(&session, &kind, "m1", &GenerationConfig::default()).unwrap();

        let Placement::Append { user, .. } = &plan.placement else {
            panic!("expected append placement");
        };
        assert!(user.is_none());
        assert_eq!(plan.placeholder.character_name.as_deref(), Some("Ada"));
        let ServiceCall::Complete(request) = plan.call else {
            panic!("expected a completion call");
        };
        assert_eq!(request.system_instruction_override.as_deref(), Some("You are Ada."));
        assert_eq!(request.personas.len(), 1);
    }

    #[test]
    fn test_regenerate_first_message_is_skipped() {
        let session = session_with(vec![
            Message::model("Welcome"),
            Message::user("Hi", Vec::new()),
        ]);
        let target = session.messages[0].id.clone();
        let kind = GenerationKind::Regeneration {
            target_id: target,
            prefix: None,
        };
        assert!(plan(&session, &kind, "unused", &GenerationConfig::default()).is_none());
    }

    #[test]
    fn test_regenerate_uses_history_before_user_message() {
        let session = session_with(vec![
            Message::user("a", Vec::new()),
            Message::model("b"),
            Message::user("c", Vec::new()),
            Message::model("d"),
        ]);
        let kind = GenerationKind::Regeneration {
            target_id: session.messages[3].id.clone(),
            prefix: None,
        };
        let plan = plan(&session, &kind, "unused", &GenerationConfig::default()).unwrap();

        let ServiceCall::Complete(request) = plan.call else {
            panic!("expected a completion call");
        };
        assert_eq!(request.prompt, "c");
        assert_eq!(request.history, session.messages[..2].to_vec());
        assert_eq!(plan.placeholder.id, session.messages[3].id);
        assert!(plan.invalidate.is_some());
    }

    #[test]
    fn test_continuation_requires_trailing_user_message() {
        let session = session_with(vec![Message::user("a", Vec::new()), Message::model("b")]);
        let config = GenerationConfig::default();
        assert!(plan(&session, &GenerationKind::Continuation, "m1", &config).is_none());
        assert!(plan(&session, &GenerationKind::MimicTurn, "m1", &config).is_some());
    }

    #[test]
    fn test_mimic_forces_permissive_overrides() {
        let session = session_with(vec![Message::user("a", Vec::new()), Message::model("b")]);
        let plan = plan(&session, &GenerationKind::MimicTurn, "m1", &GenerationConfig::default())
            .unwrap();

        assert_eq!(plan.placeholder.role, MessageRole::User);
        let ServiceCall::Mimic(request) = plan.call else {
            panic!("expected a mimic call");
        };
        assert_eq!(request.overrides, SettingsOverride::role_mimic(true));
        assert_eq!(request.history[0].role, MessageRole::Model);
        assert_eq!(request.history[1].role, MessageRole::User);
    }
}
