use super::App;
use anyhow::Result;
use parley_application::AutoSendSequencer;
use std::sync::Arc;

pub async fn run(
    app: &App,
    session_id: &str,
    prompt: String,
    times: u32,
    persona: Option<String>,
) -> Result<()> {
    let sequencer = AutoSendSequencer::new(
        Arc::clone(&app.orchestrator),
        app.config.auto_send.clone(),
    );
    sequencer.start(session_id, prompt, times, persona).await?;

    let state = sequencer.state();
    if state.is_prepared {
        anyhow::bail!("Session is in persona mode; pass --persona to pick who answers");
    }

    let mut updates = sequencer.subscribe();
    let progress = tokio::spawn(async move {
        let mut last_remaining = None;
        let mut last_countdown = None;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if !state.is_active {
                break;
            }
            if state.is_waiting_for_error_retry {
                if last_countdown != Some(state.retry_countdown_seconds) {
                    eprintln!("Round failed, retrying in {}s", state.retry_countdown_seconds);
                    last_countdown = Some(state.retry_countdown_seconds);
                }
            } else {
                last_countdown = None;
            }
            if last_remaining != Some(state.remaining) {
                eprintln!("{} rounds remaining", state.remaining);
                last_remaining = Some(state.remaining);
            }
        }
    });

    tokio::select! {
        _ = sequencer.finished() => {}
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                eprintln!("Stopping auto-send...");
            }
            sequencer.stop().await;
        }
    }
    progress.abort();

    super::session::show(app, session_id, false).await
}
