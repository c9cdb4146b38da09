mod common;

use common::*;
use parley_application::{
    EditAction, EditOutcome, EditResubmitController, GenerationOutcome, SendRequest,
};
use parley_core::session::{Message, MessageRole};
use std::sync::Arc;

fn controller(h: &Harness) -> EditResubmitController {
    EditResubmitController::new(Arc::clone(&h.orchestrator))
}

fn edit(h: &Harness, message_id: &str, content: &str) -> parley_application::MessageEdit {
    parley_application::MessageEdit::new(&h.session_id, message_id, content)
}

#[tokio::test]
async fn test_continue_prefix_concatenates() {
    let session = session_with(vec![
        Message::user("Greet the world", Vec::new()),
        Message::model("Hi there, planet"),
    ]);
    let target = session.messages[1].id.clone();
    let h = Harness::new(session, vec![reply("world")]);

    let outcome = controller(&h)
        .apply(edit(&h, &target, "Hello "), EditAction::ContinuePrefix)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        EditOutcome::Generated(GenerationOutcome::Completed {
            message_id: target.clone()
        })
    );
    let message = h.session().await.messages[1].clone();
    assert_eq!(message.id, target);
    assert_eq!(message.content, "Hello world");
    assert_eq!(
        h.client.last_request().response_prefix.as_deref(),
        Some("Hello ")
    );
}

#[tokio::test]
async fn test_continue_prefix_cancel_restores_pre_edit_message() {
    let original = Message::model("Hi there, planet");
    let session = session_with(vec![Message::user("Greet", Vec::new()), original.clone()]);
    let h = Harness::new(session, vec![Script::Hang]);
    let mut events = h.orchestrator.subscribe();

    let orchestrator = Arc::clone(&h.orchestrator);
    let session_id = h.session_id.clone();
    let target = original.id.clone();
    let task = tokio::spawn(async move {
        EditResubmitController::new(orchestrator)
            .apply(
                parley_application::MessageEdit::new(&session_id, &target, "Hello "),
                EditAction::ContinuePrefix,
            )
            .await
    });
    wait_started(&mut events).await;
    assert_eq!(h.session().await.messages[1].content, "Hello ");

    let outcome = controller(&h)
        .apply(edit(&h, &original.id, ""), EditAction::Cancel)
        .await
        .unwrap();
    assert_eq!(outcome, EditOutcome::Discarded);
    assert_eq!(h.session().await.messages[1], original);
    assert_eq!(
        task.await.unwrap().unwrap(),
        EditOutcome::Generated(GenerationOutcome::Cancelled)
    );
}

#[tokio::test]
async fn test_continue_prefix_rejects_user_messages() {
    let session = session_with(vec![Message::user("a", Vec::new()), Message::model("b")]);
    let target = session.messages[0].id.clone();
    let h = Harness::new(session, Vec::new());

    let outcome = controller(&h)
        .apply(edit(&h, &target, "prefix"), EditAction::ContinuePrefix)
        .await
        .unwrap();
    assert_eq!(outcome, EditOutcome::Generated(GenerationOutcome::Skipped));
    assert_eq!(h.client.request_count(), 0);
}

#[tokio::test]
async fn test_save_locally_replaces_content_and_clears_audio() {
    let mut answer = Message::model("old");
    answer.cached_audio_buffers = Some(vec!["chunk".to_string()]);
    let session = session_with(vec![Message::user("a", Vec::new()), answer.clone()]);
    let h = Harness::new(session, Vec::new());

    let outcome = controller(&h)
        .apply(edit(&h, &answer.id, "new"), EditAction::SaveLocally)
        .await
        .unwrap();

    assert_eq!(outcome, EditOutcome::Saved);
    let saved = h.session().await.messages[1].clone();
    assert_eq!(saved.id, answer.id);
    assert_eq!(saved.content, "new");
    assert!(saved.cached_audio_buffers.is_none());
    assert_eq!(h.client.request_count(), 0);
}

#[tokio::test]
async fn test_save_and_submit_user_message_truncates_and_resends() {
    let session = session_with(vec![
        Message::user("a", Vec::new()),
        Message::model("b"),
        Message::user("c", Vec::new()),
        Message::model("d"),
    ]);
    let edited_id = session.messages[0].id.clone();
    let dropped_id = session.messages[1].id.clone();
    let h = Harness::new(session, vec![reply("b2")]);

    let outcome = controller(&h)
        .apply(edit(&h, &edited_id, "a2"), EditAction::SaveAndSubmit)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        EditOutcome::Generated(GenerationOutcome::Completed { .. })
    ));

    let session = h.session().await;
    let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["a2", "b2"]);
    assert_ne!(session.messages[0].id, edited_id);
    assert!(h.client.last_request().history.is_empty());
    assert!(h.orchestrator.generation_time(&dropped_id).is_none());
}

#[tokio::test]
async fn test_save_and_submit_model_message_becomes_prompt() {
    let session = session_with(vec![
        Message::user("a", Vec::new()),
        Message::model("b"),
        Message::user("c", Vec::new()),
        Message::model("d"),
    ]);
    let original_user = session.messages[2].clone();
    let edited_id = session.messages[3].id.clone();
    let h = Harness::new(session, vec![reply("e")]);

    controller(&h)
        .apply(edit(&h, &edited_id, "d, rewritten"), EditAction::SaveAndSubmit)
        .await
        .unwrap();

    let session = h.session().await;
    let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["a", "b", "c", "d, rewritten", "e"]);
    assert_eq!(session.messages[2], original_user);
    assert_eq!(session.messages[3].role, MessageRole::User);
    assert_eq!(h.client.last_request().prompt, "d, rewritten");
    assert_eq!(h.client.last_request().history.len(), 3);
}

#[tokio::test]
async fn test_empty_submit_is_discarded() {
    let session = session_with(vec![Message::user("a", Vec::new()), Message::model("b")]);
    let target = session.messages[0].id.clone();
    let before = session.messages.clone();
    let h = Harness::new(session, Vec::new());

    let outcome = controller(&h)
        .apply(edit(&h, &target, "  "), EditAction::SaveAndSubmit)
        .await
        .unwrap();
    assert_eq!(outcome, EditOutcome::Discarded);
    assert_eq!(h.session().await.messages, before);
}

#[tokio::test]
async fn test_submit_while_generating_is_skipped() {
    let h = Harness::new(
        session_with(vec![Message::user("a", Vec::new())]),
        vec![Script::Hang],
    );
    let mut events = h.orchestrator.subscribe();
    let first = h.session().await.messages[0].id.clone();

    let orchestrator = Arc::clone(&h.orchestrator);
    let session_id = h.session_id.clone();
    let task = tokio::spawn(async move {
        orchestrator.send(&session_id, SendRequest::new("b")).await
    });
    wait_started(&mut events).await;

    let outcome = controller(&h)
        .apply(edit(&h, &first, "a2"), EditAction::SaveAndSubmit)
        .await
        .unwrap();
    assert_eq!(outcome, EditOutcome::Generated(GenerationOutcome::Skipped));

    h.orchestrator.cancel(&h.session_id).await.unwrap();
    task.await.unwrap().unwrap();
}
