//! Auto-send sequencer.
//!
//! Drives the orchestrator with a fixed prompt a bounded number of times. A
//! failed round waits out a countdown and then regenerates the errored
//! message; retries never consume a repetition.

use crate::generation::{GenerationOrchestrator, GenerationOutcome, SendRequest};
use parley_core::config::AutoSendConfig;
use parley_core::error::{ParleyError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Observable auto-send state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoSendState {
    pub is_active: bool,
    /// Active but waiting for a persona to be picked before the first round
    pub is_prepared: bool,
    pub session_id: Option<String>,
    pub remaining: u32,
    pub prompt_text: String,
    pub target_character_id: Option<String>,
    pub is_waiting_for_error_retry: bool,
    pub retry_countdown_seconds: u32,
}

struct ActiveRun {
    session_id: String,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    orchestrator: Arc<GenerationOrchestrator>,
    config: AutoSendConfig,
    state: watch::Sender<AutoSendState>,
    /// Bumped on every start so a finished loop only resets its own state.
    epoch: AtomicU64,
}

impl Inner {
    fn publish(&self, epoch: u64, update: impl FnOnce(&mut AutoSendState)) {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.state.send_modify(update);
        }
    }
}

pub struct AutoSendSequencer {
    inner: Arc<Inner>,
    run: Mutex<Option<ActiveRun>>,
}

impl AutoSendSequencer {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>, config: AutoSendConfig) -> Self {
        let (state, _) = watch::channel(AutoSendState::default());
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                config,
                state,
                epoch: AtomicU64::new(0),
            }),
            run: Mutex::new(None),
        }
    }

    pub fn state(&self) -> AutoSendState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutoSendState> {
        self.inner.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.borrow().is_active
    }

    /// Starts sending `prompt` `repetitions` times.
    ///
    /// In a persona session without `persona_id` the sequencer only prepares
    /// and waits for [`select_persona`](Self::select_persona).
    ///
    /// # Errors
    ///
    /// - `InvalidState` if a run is active, the session is generating, or
    ///   `repetitions` is outside `1..=max_repetitions`
    /// - `NotFound` if the session does not exist
    pub async fn start(
        &self,
        session_id: &str,
        prompt: impl Into<String>,
        repetitions: u32,
        persona_id: Option<String>,
    ) -> Result<()> {
        if self.is_active() {
            return Err(ParleyError::invalid_state("Auto-send is already active"));
        }
        if repetitions == 0 || repetitions > self.inner.config.max_repetitions {
            return Err(ParleyError::invalid_state(format!(
                "Repetitions must be between 1 and {}, got {}",
                self.inner.config.max_repetitions, repetitions
            )));
        }
        if self.inner.orchestrator.is_generating(session_id) {
            return Err(ParleyError::invalid_state(format!(
                "Session {} is generating",
                session_id
            )));
        }
        let session = self
            .inner
            .orchestrator
            .store()
            .load(session_id)
            .await?
            .ok_or_else(|| ParleyError::not_found("Session", session_id))?;

        let prepared = session.is_persona_mode() && persona_id.is_none();
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(AutoSendState {
            is_active: true,
            is_prepared: prepared,
            session_id: Some(session_id.to_string()),
            remaining: repetitions,
            prompt_text: prompt.into(),
            target_character_id: persona_id,
            ..AutoSendState::default()
        });

        tracing::info!(
            target: "parley::auto_send",
            "[AutoSend] Started in session {} ({} repetitions{})",
            session_id,
            repetitions,
            if prepared { ", waiting for persona" } else { "" }
        );

        let mut run = ActiveRun {
            session_id: session_id.to_string(),
            stop: CancellationToken::new(),
            handle: None,
        };
        if !prepared {
            run.handle = Some(self.spawn_loop(epoch, &run));
        }
        *self.lock_run() = Some(run);
        Ok(())
    }

    /// Picks the persona for a prepared run and issues the first round.
    pub fn select_persona(&self, persona_id: impl Into<String>) -> Result<()> {
        let state = self.state();
        if !state.is_active || !state.is_prepared {
            return Err(ParleyError::invalid_state("Auto-send is not waiting for a persona"));
        }

        let persona_id = persona_id.into();
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        self.inner.publish(epoch, |s| {
            s.is_prepared = false;
            s.target_character_id = Some(persona_id);
        });

        let mut guard = self.lock_run();
        let Some(run) = guard.as_mut() else {
            return Err(ParleyError::internal("Prepared auto-send has no run"));
        };
        let handle = self.spawn_loop(epoch, run);
        run.handle = Some(handle);
        Ok(())
    }

    /// Stops the run: cancels the countdown and any in-flight generation, then
    /// resets the state.
    pub async fn stop(&self) {
        let run = self.lock_run().take();
        if let Some(run) = run {
            tracing::info!(
                target: "parley::auto_send",
                "[AutoSend] Stopping in session {}",
                run.session_id
            );
            run.stop.cancel();
            if let Some(handle) = run.handle {
                if let Err(e) = handle.await {
                    tracing::error!(
                        target: "parley::auto_send",
                        "[AutoSend] Loop task failed: {}",
                        e
                    );
                }
            }
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_replace(AutoSendState::default());
    }

    /// Stops a run that belongs to another session.
    pub async fn on_session_switch(&self, session_id: &str) {
        let other = self
            .lock_run()
            .as_ref()
            .is_some_and(|run| run.session_id != session_id);
        if other {
            self.stop().await;
        }
    }

    /// Waits until the current run ends.
    pub async fn finished(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this only fails if it is gone.
        let _ = rx.wait_for(|state| !state.is_active).await;
    }

    fn spawn_loop(&self, epoch: u64, run: &ActiveRun) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let stop = run.stop.clone();
        let session_id = run.session_id.clone();
        tokio::spawn(async move {
            run_loop(Arc::clone(&inner), epoch, session_id, stop).await;
            inner.publish(epoch, |s| *s = AutoSendState::default());
        })
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, Option<ActiveRun>> {
        self.run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AutoSendSequencer {
    fn drop(&mut self) {
        if let Some(run) = self.lock_run().take() {
            // The loop cancels its own in-flight generation when stopped.
            run.stop.cancel();
        }
    }
}

/// One round: a send, or the regeneration of the previous round's error.
async fn run_round(
    inner: &Inner,
    session_id: &str,
    state: &AutoSendState,
    errored: Option<&str>,
    stop: &CancellationToken,
) -> Result<GenerationOutcome> {
    let orchestrator = &inner.orchestrator;
    let round = async {
        match errored {
            Some(message_id) => orchestrator.regenerate_message(session_id, message_id).await,
            None => {
                let mut request = SendRequest::new(state.prompt_text.clone());
                if let Some(persona_id) = &state.target_character_id {
                    request = request.with_persona(persona_id.clone());
                }
                orchestrator.send(session_id, request).await
            }
        }
    };
    tokio::pin!(round);

    tokio::select! {
        result = &mut round => result,
        _ = stop.cancelled() => {
            if let Err(e) = orchestrator.cancel(session_id).await {
                tracing::error!(
                    target: "parley::auto_send",
                    "[AutoSend] Failed to cancel round in session {}: {}",
                    session_id,
                    e
                );
            }
            round.await
        }
    }
}

async fn run_loop(inner: Arc<Inner>, epoch: u64, session_id: String, stop: CancellationToken) {
    let mut errored: Option<String> = None;
    let mut retries = 0u32;

    loop {
        if stop.is_cancelled() {
            break;
        }
        let state = inner.state.borrow().clone();
        if state.remaining == 0 {
            tracing::info!(target: "parley::auto_send", "[AutoSend] All repetitions sent");
            break;
        }

        let outcome =
            match run_round(&inner, &session_id, &state, errored.as_deref(), &stop).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(target: "parley::auto_send", "[AutoSend] Round failed: {}", e);
                    break;
                }
            };

        match outcome {
            GenerationOutcome::Completed { .. } => {
                errored = None;
                retries = 0;
                inner.publish(epoch, |s| s.remaining = s.remaining.saturating_sub(1));
                tracing::debug!(
                    target: "parley::auto_send",
                    "[AutoSend] Round completed, {} left",
                    state.remaining.saturating_sub(1)
                );
            }
            GenerationOutcome::Failed { message_id, error } => {
                if retries >= inner.config.max_error_retries {
                    tracing::warn!(
                        target: "parley::auto_send",
                        "[AutoSend] Giving up after {} retries: {}",
                        retries,
                        error
                    );
                    break;
                }
                retries += 1;
                tracing::warn!(
                    target: "parley::auto_send",
                    "[AutoSend] Round failed ({}), retry {} of {} in {}s",
                    error,
                    retries,
                    inner.config.max_error_retries,
                    inner.config.retry_countdown_secs
                );
                if !countdown(&inner, epoch, &stop).await {
                    break;
                }
                errored = Some(message_id);
            }
            GenerationOutcome::Cancelled | GenerationOutcome::Skipped => {
                tracing::info!(
                    target: "parley::auto_send",
                    "[AutoSend] Round ended without a result ({:?}), stopping",
                    outcome
                );
                break;
            }
        }
    }
}

/// Ticks the retry countdown once per second. Returns false when stopped.
async fn countdown(inner: &Inner, epoch: u64, stop: &CancellationToken) -> bool {
    let mut left = inner.config.retry_countdown_secs;
    inner.publish(epoch, |s| {
        s.is_waiting_for_error_retry = true;
        s.retry_countdown_seconds = left;
    });

    while left > 0 {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return false,
            _ = tokio::time::sleep(COUNTDOWN_TICK) => {}
        }
        left -= 1;
        inner.publish(epoch, |s| s.retry_countdown_seconds = left);
    }

    inner.publish(epoch, |s| s.is_waiting_for_error_retry = false);
    true
}
