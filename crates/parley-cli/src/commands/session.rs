use super::App;
use anyhow::{Context, Result, bail};
use parley_core::persona::Persona;
use parley_core::session::{GenerationSettings, MessageRole, Session, SessionStore};

pub async fn create(app: &App, model: String, system: Option<String>) -> Result<()> {
    let settings = GenerationSettings {
        system_instruction: system,
        ..GenerationSettings::default()
    };
    let session = Session::new(model, settings);
    app.updater
        .create(&session)
        .await
        .context("Failed to save session")?;
    println!("{}", session.id);
    Ok(())
}

pub async fn list(app: &App) -> Result<()> {
    let sessions = app.updater.repository().list_all().await?;
    if sessions.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    for session in sessions {
        println!(
            "{}  {}  {} messages  {}",
            session.id,
            session.updated_at,
            session.messages.len(),
            session.title
        );
    }
    Ok(())
}

pub async fn show(app: &App, session_id: &str, json: bool) -> Result<()> {
    let session = load(app, session_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("# {} ({})", session.title, session.model);
    for persona in &session.personas {
        println!("  persona {} = {}", persona.id, persona.name);
    }
    for message in &session.messages {
        let speaker = match (message.role, &message.character_name) {
            (MessageRole::User, _) => "user".to_string(),
            (MessageRole::Model, Some(name)) => name.clone(),
            (MessageRole::Model, None) => "model".to_string(),
            (MessageRole::Error, _) => "error".to_string(),
        };
        let elapsed = app
            .orchestrator
            .generation_time(&message.id)
            .map(|d| format!(" [{}]", parley_application::generation::format_elapsed(d)))
            .unwrap_or_default();
        println!("[{}] {}: {}{}", message.id, speaker, message.content, elapsed);
    }
    Ok(())
}

pub async fn add_persona(
    app: &App,
    session_id: &str,
    id: String,
    name: String,
    instruction: String,
) -> Result<()> {
    load(app, session_id).await?;
    let persona = Persona::new(id, name, instruction);
    app.updater
        .update_session(
            session_id,
            Box::new(move |mut s: Session| {
                if s.personas.iter().any(|p| p.id == persona.id) {
                    return None;
                }
                s.personas.push(persona);
                s.persona_mode = true;
                Some(s)
            }),
        )
        .await?;
    Ok(())
}

pub async fn clear_personas(app: &App, session_id: &str) -> Result<()> {
    app.updater
        .update_session(
            session_id,
            Box::new(|mut s: Session| {
                s.personas.clear();
                s.persona_mode = false;
                Some(s)
            }),
        )
        .await?;
    Ok(())
}

pub async fn load(app: &App, session_id: &str) -> Result<Session> {
    match app.updater.load(session_id).await? {
        Some(session) => Ok(session),
        None => bail!("Session {} not found", session_id),
    }
}
