pub mod auto_send;
pub mod edit;
pub mod generate;
pub mod session;

use anyhow::{Context, Result};
use parley_application::{GenerationOrchestrator, GenerationOutcome, SessionUpdater};
use parley_core::config::ParleyConfig;
use parley_execution::WorkerGuard;
use parley_infrastructure::{
    ConfigService, EchoCompletionClient, MemoryContextCache, TomlSessionRepository,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs, wired from the loaded config.
pub struct App {
    pub config: ParleyConfig,
    pub updater: Arc<SessionUpdater>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    _log_guard: Option<WorkerGuard>,
}

impl App {
    pub fn bootstrap(config_path: Option<PathBuf>, sessions_dir: Option<PathBuf>) -> Result<Self> {
        let service = match config_path {
            Some(path) => ConfigService::with_path(path),
            None => ConfigService::default_location().context("Failed to locate config file")?,
        };
        let mut config = service
            .load()
            .with_context(|| format!("Failed to load {}", service.path().display()))?;
        if sessions_dir.is_some() {
            config.storage.sessions_dir = sessions_dir;
        }

        let log_guard = parley_execution::init_logging(&config.logging, None)
            .context("Failed to initialize logging")?;

        let dir = ConfigService::sessions_dir(&config)?;
        let repository = TomlSessionRepository::new(&dir)
            .with_context(|| format!("Failed to open sessions directory {}", dir.display()))?;
        let updater = Arc::new(SessionUpdater::new(Arc::new(repository)));

        let orchestrator = GenerationOrchestrator::new(
            updater.clone(),
            Arc::new(EchoCompletionClient::default()),
            config.generation.clone(),
        )
        .with_context_cache(Arc::new(MemoryContextCache::new()));

        Ok(Self {
            config,
            updater,
            orchestrator: Arc::new(orchestrator),
            _log_guard: log_guard,
        })
    }

    /// Runs `task`, cancelling the session's generation on Ctrl-C.
    pub async fn interruptible<F, T>(&self, session_id: &str, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        let session_id = session_id.to_string();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling...");
                if let Err(e) = orchestrator.cancel(&session_id).await {
                    tracing::error!("Cancel failed: {}", e);
                }
            }
        });

        let output = task.await;
        watcher.abort();
        output
    }
}

/// Prints a one-line summary of a generation outcome.
pub fn report(outcome: &GenerationOutcome) {
    match outcome {
        GenerationOutcome::Completed { message_id } => println!("Completed ({})", message_id),
        GenerationOutcome::Failed { message_id, error } => {
            println!("Failed ({}): {}", message_id, error)
        }
        GenerationOutcome::Cancelled => println!("Cancelled"),
        GenerationOutcome::Skipped => println!("Nothing to do"),
    }
}
