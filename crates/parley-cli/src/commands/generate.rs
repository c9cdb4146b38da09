use super::{App, report, session};
use anyhow::Result;
use parley_application::SendRequest;

pub async fn send(
    app: &App,
    session_id: &str,
    prompt: String,
    persona: Option<String>,
) -> Result<()> {
    let mut request = SendRequest::new(prompt);
    if let Some(persona_id) = persona {
        request = request.with_persona(persona_id);
    }

    let outcome = app
        .interruptible(session_id, app.orchestrator.send(session_id, request))
        .await?;
    report(&outcome);
    print_reply(app, session_id, outcome.message_id()).await
}

pub async fn continue_flow(app: &App, session_id: &str) -> Result<()> {
    let outcome = app
        .interruptible(session_id, app.orchestrator.continue_flow(session_id))
        .await?;
    report(&outcome);
    print_reply(app, session_id, outcome.message_id()).await
}

pub async fn regenerate(app: &App, session_id: &str, message_id: &str) -> Result<()> {
    let outcome = app
        .interruptible(
            session_id,
            app.orchestrator.regenerate_message(session_id, message_id),
        )
        .await?;
    report(&outcome);
    print_reply(app, session_id, outcome.message_id()).await
}

pub async fn print_reply(app: &App, session_id: &str, message_id: Option<&str>) -> Result<()> {
    let Some(message_id) = message_id else {
        return Ok(());
    };
    let session = session::load(app, session_id).await?;
    if let Some(message) = session.message(message_id) {
        println!("{}", message.content);
    }
    Ok(())
}
