use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::App;

#[derive(Parser)]
#[command(name = "parley")]
#[command(
    about = "Parley CLI - drive conversation sessions against a completion backend",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to ~/.config/parley/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding session files, overriding the config
    #[arg(long, global = true)]
    sessions_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty session
    New {
        /// Model identifier stored on the session
        #[arg(long, default_value = "echo")]
        model: String,
        /// System instruction for the session
        #[arg(long)]
        system: Option<String>,
    },
    /// List stored sessions, most recent first
    List,
    /// Print a session transcript
    Show {
        session_id: String,
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the session's persona roster
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },
    /// Send a prompt and wait for the reply
    Send {
        session_id: String,
        prompt: String,
        /// Persona that should answer
        #[arg(long)]
        persona: Option<String>,
    },
    /// Answer a trailing user message, or speak for the user
    Continue { session_id: String },
    /// Regenerate a response message in place
    Regenerate {
        session_id: String,
        message_id: String,
    },
    /// Edit a message
    Edit {
        session_id: String,
        message_id: String,
        content: String,
        #[arg(long, value_enum, default_value_t = EditMode::Save)]
        mode: EditMode,
    },
    /// Send the same prompt repeatedly, retrying failed rounds
    AutoSend {
        session_id: String,
        prompt: String,
        /// Number of rounds
        #[arg(long, short = 'n', default_value_t = 1)]
        times: u32,
        /// Persona that should answer
        #[arg(long)]
        persona: Option<String>,
    },
}

#[derive(Subcommand)]
enum PersonaAction {
    /// Add a persona and switch the session into persona mode
    Add {
        session_id: String,
        id: String,
        name: String,
        instruction: String,
    },
    /// Remove every persona and leave persona mode
    Clear { session_id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum EditMode {
    /// Replace the content only
    Save,
    /// Replace the content and regenerate from it
    Submit,
    /// Keep the content as a prefix and let the model continue it
    ContinuePrefix,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = App::bootstrap(cli.config, cli.sessions_dir)?;

    match cli.command {
        Commands::New { model, system } => commands::session::create(&app, model, system).await?,
        Commands::List => commands::session::list(&app).await?,
        Commands::Show { session_id, json } => {
            commands::session::show(&app, &session_id, json).await?
        }
        Commands::Persona { action } => match action {
            PersonaAction::Add {
                session_id,
                id,
                name,
                instruction,
            } => commands::session::add_persona(&app, &session_id, id, name, instruction).await?,
            PersonaAction::Clear { session_id } => {
                commands::session::clear_personas(&app, &session_id).await?
            }
        },
        Commands::Send {
            session_id,
            prompt,
            persona,
        } => commands::generate::send(&app, &session_id, prompt, persona).await?,
        Commands::Continue { session_id } => {
            commands::generate::continue_flow(&app, &session_id).await?
        }
        Commands::Regenerate {
            session_id,
            message_id,
        } => commands::generate::regenerate(&app, &session_id, &message_id).await?,
        Commands::Edit {
            session_id,
            message_id,
            content,
            mode,
        } => {
            let action = match mode {
                EditMode::Save => parley_application::EditAction::SaveLocally,
                EditMode::Submit => parley_application::EditAction::SaveAndSubmit,
                EditMode::ContinuePrefix => parley_application::EditAction::ContinuePrefix,
            };
            commands::edit::run(&app, &session_id, &message_id, content, action).await?
        }
        Commands::AutoSend {
            session_id,
            prompt,
            times,
            persona,
        } => commands::auto_send::run(&app, &session_id, prompt, times, persona).await?,
    }

    Ok(())
}
