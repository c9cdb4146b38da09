mod common;

use common::*;
use parley_application::{AutoSendSequencer, AutoSendState};
use parley_core::config::AutoSendConfig;
use parley_core::persona::Persona;
use parley_core::session::MessageRole;
use std::sync::Arc;
use std::time::Duration;

fn sequencer(h: &Harness, config: AutoSendConfig) -> AutoSendSequencer {
    AutoSendSequencer::new(Arc::clone(&h.orchestrator), config)
}

async fn count_roles(h: &Harness, role: MessageRole) -> usize {
    h.session()
        .await
        .messages
        .iter()
        .filter(|m| m.role == role)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_repetitions() {
    let h = Harness::new(empty_session(), Vec::new());
    let auto_send = sequencer(&h, AutoSendConfig::default());

    auto_send
        .start(&h.session_id, "Keep going", 3, None)
        .await
        .unwrap();
    assert!(auto_send.is_active());
    auto_send.finished().await;

    assert_eq!(count_roles(&h, MessageRole::Model).await, 3);
    assert_eq!(count_roles(&h, MessageRole::User).await, 3);
    assert_eq!(auto_send.state(), AutoSendState::default());
    assert!(!h.orchestrator.is_generating(&h.session_id));
}

#[tokio::test(start_paused = true)]
async fn test_error_retry_does_not_consume_repetition() {
    let h = Harness::new(
        empty_session(),
        vec![fail("overloaded"), reply("one"), reply("two")],
    );
    let auto_send = sequencer(&h, AutoSendConfig::default());
    let mut states = auto_send.subscribe();

    auto_send
        .start(&h.session_id, "Keep going", 2, None)
        .await
        .unwrap();

    states
        .wait_for(|s| s.is_waiting_for_error_retry)
        .await
        .unwrap();
    assert_eq!(states.borrow().remaining, 2);

    auto_send.finished().await;

    let session = h.session().await;
    let replies: Vec<_> = session
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Model)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(replies, vec!["one", "two"]);
    assert_eq!(count_roles(&h, MessageRole::Error).await, 0);
    assert_eq!(h.client.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_each_second() {
    let h = Harness::new(empty_session(), vec![fail("overloaded")]);
    let config = AutoSendConfig {
        retry_countdown_secs: 3,
        ..AutoSendConfig::default()
    };
    let auto_send = sequencer(&h, config);
    let mut states = auto_send.subscribe();

    auto_send.start(&h.session_id, "Go", 1, None).await.unwrap();

    let mut seen = Vec::new();
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        if state.is_waiting_for_error_retry && seen.last() != Some(&state.retry_countdown_seconds) {
            seen.push(state.retry_countdown_seconds);
        }
        if !state.is_active {
            break;
        }
    }
    assert!(seen.starts_with(&[3, 2, 1]), "countdown went {:?}", seen);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let h = Harness::with_client(
        empty_session(),
        ScriptedClient::with_fallback(Vec::new(), fail("still down")),
    );
    let config = AutoSendConfig {
        max_error_retries: 2,
        ..AutoSendConfig::default()
    };
    let auto_send = sequencer(&h, config);

    auto_send.start(&h.session_id, "Go", 5, None).await.unwrap();
    auto_send.finished().await;

    // One send plus two regenerations of the same errored message.
    assert_eq!(h.client.request_count(), 3);
    assert_eq!(count_roles(&h, MessageRole::Error).await, 1);
    assert!(!auto_send.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_in_flight_generation() {
    let h = Harness::new(empty_session(), vec![Script::Hang]);
    let auto_send = sequencer(&h, AutoSendConfig::default());
    let mut events = h.orchestrator.subscribe();

    auto_send.start(&h.session_id, "Go", 3, None).await.unwrap();
    wait_started(&mut events).await;
    assert!(h.orchestrator.is_generating(&h.session_id));

    auto_send.stop().await;

    assert!(!auto_send.is_active());
    assert!(!h.orchestrator.is_generating(&h.session_id));
    assert!(h.session().await.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_countdown() {
    let h = Harness::new(empty_session(), vec![fail("overloaded")]);
    let auto_send = sequencer(&h, AutoSendConfig::default());
    let mut states = auto_send.subscribe();

    auto_send.start(&h.session_id, "Go", 2, None).await.unwrap();
    states
        .wait_for(|s| s.is_waiting_for_error_retry)
        .await
        .unwrap();

    auto_send.stop().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(h.client.request_count(), 1);
    assert_eq!(auto_send.state(), AutoSendState::default());
}

#[tokio::test(start_paused = true)]
async fn test_session_switch_stops_run() {
    let h = Harness::new(empty_session(), vec![fail("overloaded")]);
    let auto_send = sequencer(&h, AutoSendConfig::default());
    let mut states = auto_send.subscribe();

    auto_send.start(&h.session_id, "Go", 2, None).await.unwrap();
    states
        .wait_for(|s| s.is_waiting_for_error_retry)
        .await
        .unwrap();

    auto_send.on_session_switch(&h.session_id).await;
    assert!(auto_send.is_active());

    auto_send.on_session_switch("another-session").await;
    assert!(!auto_send.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_rejects_invalid_start() {
    let h = Harness::new(empty_session(), Vec::new());
    let auto_send = sequencer(&h, AutoSendConfig::default());

    assert!(auto_send.start(&h.session_id, "Go", 0, None).await.is_err());
    assert!(auto_send.start(&h.session_id, "Go", 101, None).await.is_err());
    assert!(auto_send.start("missing", "Go", 1, None).await.is_err());
    assert!(!auto_send.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_persona_mode_waits_for_persona() {
    let mut session = empty_session();
    session.personas = vec![
        Persona::new("alice-id", "Alice", "You are Alice."),
        Persona::new("bob-id", "Bob", "You are Bob."),
    ];
    session.persona_mode = true;
    let h = Harness::new(session, Vec::new());
    let auto_send = sequencer(&h, AutoSendConfig::default());

    auto_send.start(&h.session_id, "Go", 2, None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let state = auto_send.state();
    assert!(state.is_active);
    assert!(state.is_prepared);
    assert_eq!(h.client.request_count(), 0);

    auto_send.select_persona("bob-id").unwrap();
    auto_send.finished().await;

    let requests = h.client.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(
        requests
            .iter()
            .all(|r| r.system_instruction_override.as_deref() == Some("You are Bob."))
    );
    assert!(
        h.session()
            .await
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Model)
            .all(|m| m.character_name.as_deref() == Some("Bob"))
    );
}
