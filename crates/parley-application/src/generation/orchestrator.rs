//! Generation orchestrator.
//!
//! Turns a user intent into exactly one completion request per session,
//! manages the placeholder message across the request, and leaves the session
//! consistent whether the request succeeds, fails, or is cancelled.

use super::context::GenerationContext;
use super::events::GenerationEvent;
use super::kind::{GenerationKind, GenerationOutcome, SendRequest};
use super::plan::{GenerationPlan, ServiceCall, plan};
use super::telemetry::{GenerationTelemetry, format_elapsed};
use parley_core::completion::{CompletionClient, CompletionError, CompletionResponse};
use parley_core::config::GenerationConfig;
use parley_core::context_cache::{ContextCache, NoContextCache};
use parley_core::error::{ParleyError, Result};
use parley_core::notify::{AiMessageNotifier, NullNotifier};
use parley_core::session::{Message, MessageRole, Session, SessionStore, new_message_id};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of the external call, before it is applied to the session.
enum CallResult {
    Success {
        text: String,
        grounding_metadata: Option<serde_json::Value>,
    },
    Failure(String),
    Cancelled,
}

/// A claimed pending slot, freed when dropped so that an abandoned
/// generation future cannot leave its session busy.
struct PendingSlot<'a> {
    orchestrator: &'a GenerationOrchestrator,
    ctx: Arc<GenerationContext>,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.orchestrator.release(&self.ctx);
    }
}

/// Coordinates generations across sessions, one in flight per session.
pub struct GenerationOrchestrator {
    store: Arc<dyn SessionStore>,
    client: Arc<dyn CompletionClient>,
    context_cache: Arc<dyn ContextCache>,
    notifier: Arc<dyn AiMessageNotifier>,
    config: GenerationConfig,
    /// Pending generations keyed by session id.
    pending: Mutex<HashMap<String, Arc<GenerationContext>>>,
    telemetry: GenerationTelemetry,
    events: broadcast::Sender<GenerationEvent>,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        client: Arc<dyn CompletionClient>,
        config: GenerationConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            client,
            context_cache: Arc::new(NoContextCache),
            notifier: Arc::new(NullNotifier),
            config,
            pending: Mutex::new(HashMap::new()),
            telemetry: GenerationTelemetry::new(),
            events,
        }
    }

    pub fn with_context_cache(mut self, cache: Arc<dyn ContextCache>) -> Self {
        self.context_cache = cache;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AiMessageNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Subscribe to generation lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events.subscribe()
    }

    /// True while a generation is pending for the session.
    pub fn is_generating(&self, session_id: &str) -> bool {
        self.lock_pending().contains_key(session_id)
    }

    /// Id of the message the pending generation is producing.
    pub fn pending_message_id(&self, session_id: &str) -> Option<String> {
        self.lock_pending()
            .get(session_id)
            .map(|ctx| ctx.message_id().to_string())
    }

    /// Elapsed time of the pending generation, e.g. `"2.3s"`.
    pub fn elapsed_time_display(&self, session_id: &str) -> Option<String> {
        self.lock_pending()
            .get(session_id)
            .map(|ctx| format_elapsed(ctx.elapsed()))
    }

    /// How long the generation that produced `message_id` took.
    pub fn generation_time(&self, message_id: &str) -> Option<Duration> {
        self.telemetry.get(message_id)
    }

    /// Drops recorded generation times, e.g. after the messages were edited away.
    pub fn discard_generation_times<'a>(&self, message_ids: impl IntoIterator<Item = &'a str>) {
        self.telemetry.clear_many(message_ids);
    }

    /// Sends a new user turn and waits for the answer.
    pub async fn send(&self, session_id: &str, request: SendRequest) -> Result<GenerationOutcome> {
        self.generate(session_id, GenerationKind::NewTurn(request))
            .await
    }

    /// Answers a trailing user message, or writes the user's next turn when
    /// the conversation ends on a model or error message.
    pub async fn continue_flow(&self, session_id: &str) -> Result<GenerationOutcome> {
        if self.is_generating(session_id) {
            return Ok(GenerationOutcome::Skipped);
        }
        let Some(session) = self.store.load(session_id).await? else {
            return Ok(GenerationOutcome::Skipped);
        };

        let kind = match session.messages.last().map(|m| m.role) {
            Some(MessageRole::User) => GenerationKind::Continuation,
            Some(MessageRole::Model | MessageRole::Error) => GenerationKind::MimicTurn,
            None => return Ok(GenerationOutcome::Skipped),
        };
        self.generate(session_id, kind).await
    }

    /// Writes a fresh answer over a model or error message.
    pub async fn regenerate_message(
        &self,
        session_id: &str,
        target_message_id: &str,
    ) -> Result<GenerationOutcome> {
        self.generate(
            session_id,
            GenerationKind::Regeneration {
                target_id: target_message_id.to_string(),
                prefix: None,
            },
        )
        .await
    }

    /// Regenerates the answer that immediately follows a user message.
    pub async fn regenerate_following_user_message(
        &self,
        session_id: &str,
        user_message_id: &str,
    ) -> Result<GenerationOutcome> {
        let Some(session) = self.store.load(session_id).await? else {
            return Ok(GenerationOutcome::Skipped);
        };

        let following = session
            .index_of(user_message_id)
            .and_then(|index| session.messages.get(index + 1))
            .filter(|m| m.role.is_response());

        match following {
            Some(message) => {
                let target_id = message.id.clone();
                self.regenerate_message(session_id, &target_id).await
            }
            None => {
                tracing::info!(
                    "[GenerationOrchestrator] No response follows message {} in session {}",
                    user_message_id,
                    session_id
                );
                Ok(GenerationOutcome::Skipped)
            }
        }
    }

    /// Regenerates a model message so that it continues from `prefix`.
    pub async fn continue_from_prefix(
        &self,
        session_id: &str,
        message_id: &str,
        prefix: impl Into<String>,
    ) -> Result<GenerationOutcome> {
        self.generate(
            session_id,
            GenerationKind::Regeneration {
                target_id: message_id.to_string(),
                prefix: Some(prefix.into()),
            },
        )
        .await
    }

    /// Cancels the pending generation of a session and rolls the session back
    /// before returning.
    ///
    /// Returns `false` when nothing was pending.
    pub async fn cancel(&self, session_id: &str) -> Result<bool> {
        let Some(ctx) = self.lock_pending().get(session_id).cloned() else {
            return Ok(false);
        };
        if !ctx.try_cancel() {
            // Already finishing or cancelled.
            return Ok(false);
        }

        tracing::info!(
            "[GenerationOrchestrator] Cancelling generation {} in session {}",
            ctx.message_id(),
            session_id
        );

        if ctx.has_placeholder() && ctx.claim_rollback() {
            let result = self.roll_back(&ctx).await;
            self.release(&ctx);
            self.emit(GenerationEvent::Cancelled {
                session_id: session_id.to_string(),
                message_id: ctx.message_id().to_string(),
            });
            result?;
        } else {
            // The placeholder write is still in flight; the generating task
            // rolls it back once it lands.
            self.release(&ctx);
        }
        Ok(true)
    }

    /// Runs one generation of any kind.
    pub async fn generate(
        &self,
        session_id: &str,
        kind: GenerationKind,
    ) -> Result<GenerationOutcome> {
        let message_id = match &kind {
            GenerationKind::Regeneration { target_id, .. } => target_id.clone(),
            _ => new_message_id(),
        };
        let Some(slot) = self.claim(session_id, &message_id) else {
            tracing::debug!(
                "[GenerationOrchestrator] Session {} is busy, ignoring {}",
                session_id,
                kind.label()
            );
            return Ok(GenerationOutcome::Skipped);
        };

        let result = self.drive(&slot.ctx, &kind).await;
        drop(slot);

        if let Err(e) = &result {
            tracing::error!(
                "[GenerationOrchestrator] {} in session {} failed: {}",
                kind.label(),
                session_id,
                e
            );
        }
        result
    }

    async fn drive(
        &self,
        ctx: &Arc<GenerationContext>,
        kind: &GenerationKind,
    ) -> Result<GenerationOutcome> {
        let session_id = ctx.session_id();
        let Some(session) = self.store.load(session_id).await? else {
            tracing::warn!("[GenerationOrchestrator] Session {} not found", session_id);
            return Ok(GenerationOutcome::Skipped);
        };
        let Some(plan) = plan(&session, kind, ctx.message_id(), &self.config) else {
            tracing::debug!(
                "[GenerationOrchestrator] Preconditions for {} not met in session {}",
                kind.label(),
                session_id
            );
            return Ok(GenerationOutcome::Skipped);
        };

        if matches!(kind, GenerationKind::Regeneration { .. }) {
            self.telemetry.clear(ctx.message_id());
        }

        self.store
            .update_session(
                session_id,
                plan.placeholder_mutation(Arc::clone(ctx), self.config.default_title.clone()),
            )
            .await?;

        if !ctx.has_placeholder() {
            return Ok(GenerationOutcome::Skipped);
        }
        if ctx.is_cancelled() {
            // Cancelled while the placeholder was being written.
            if ctx.claim_rollback() {
                self.roll_back(ctx).await?;
                self.emit(GenerationEvent::Cancelled {
                    session_id: session_id.to_string(),
                    message_id: ctx.message_id().to_string(),
                });
            }
            return Ok(GenerationOutcome::Cancelled);
        }

        self.emit(GenerationEvent::Started {
            session_id: session_id.to_string(),
            message_id: ctx.message_id().to_string(),
            kind: kind.label(),
        });
        tracing::info!(
            "[GenerationOrchestrator] Started {} for message {} in session {}",
            kind.label(),
            ctx.message_id(),
            session_id
        );

        if let Some(key) = &plan.invalidate {
            self.context_cache.invalidate(key).await;
        }

        let result = self.call_service(ctx, &plan).await;
        self.finish(ctx, &plan, result).await
    }

    async fn call_service(&self, ctx: &GenerationContext, plan: &GenerationPlan) -> CallResult {
        let token = ctx.token().clone();

        let outcome = match &plan.call {
            ServiceCall::Complete(request) => {
                let call = self.client.complete(request.clone(), token.clone());
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(CompletionError::Cancelled),
                    result = call => result,
                }
            }
            ServiceCall::Mimic(request) => {
                let call = self.client.mimic_user(request.clone(), token.clone());
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(CompletionError::Cancelled),
                    result = call => result.map(|text| {
                        (!text.trim().is_empty()).then(|| CompletionResponse::text(text))
                    }),
                }
            }
        };

        match outcome {
            Ok(Some(response)) => CallResult::Success {
                text: response.text,
                grounding_metadata: response.grounding_metadata,
            },
            Ok(None) => CallResult::Failure(self.config.stream_failure_message.clone()),
            Err(e) if e.is_cancellation() => CallResult::Cancelled,
            Err(e) => CallResult::Failure(format!("Error: {}", e)),
        }
    }

    async fn finish(
        &self,
        ctx: &Arc<GenerationContext>,
        plan: &GenerationPlan,
        result: CallResult,
    ) -> Result<GenerationOutcome> {
        let session_id = ctx.session_id();
        let message_id = ctx.message_id().to_string();

        let (role, content, grounding, error) = match result {
            CallResult::Cancelled => {
                // The client gave up on its own; treat it like a user cancel.
                if ctx.try_cancel() && ctx.claim_rollback() {
                    self.roll_back(ctx).await?;
                    self.emit(GenerationEvent::Cancelled {
                        session_id: session_id.to_string(),
                        message_id,
                    });
                }
                return Ok(GenerationOutcome::Cancelled);
            }
            CallResult::Success {
                text,
                grounding_metadata,
            } => {
                let content = match &plan.prefix {
                    Some(prefix) => format!("{}{}", prefix, text),
                    None => text,
                };
                (plan.success_role, content, grounding_metadata, None)
            }
            CallResult::Failure(error) => (MessageRole::Error, error.clone(), None, Some(error)),
        };

        if !ctx.try_finish() {
            tracing::debug!(
                "[GenerationOrchestrator] Discarding late result for cancelled message {}",
                message_id
            );
            return Ok(GenerationOutcome::Cancelled);
        }

        let finalized = plan.placeholder.finalized(role, content, grounding);
        if let Err(e) = self.write_message(session_id, finalized.clone()).await {
            tracing::error!(
                "[GenerationOrchestrator] Failed to finalize message {}: {}",
                message_id,
                e
            );
            self.settle_placeholder(ctx, plan, &e).await;
            return Err(e);
        }

        match error {
            None => {
                let elapsed = ctx.elapsed();
                self.telemetry.record(&message_id, elapsed);
                if finalized.role == MessageRole::Model {
                    self.notifier.notify_new_ai_message(&finalized);
                }
                tracing::info!(
                    "[GenerationOrchestrator] Completed message {} in {}",
                    message_id,
                    format_elapsed(elapsed)
                );
                self.emit(GenerationEvent::Completed {
                    session_id: session_id.to_string(),
                    message_id: message_id.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
                Ok(GenerationOutcome::Completed { message_id })
            }
            Some(error) => {
                tracing::warn!(
                    "[GenerationOrchestrator] Message {} failed: {}",
                    message_id,
                    error
                );
                self.emit(GenerationEvent::Failed {
                    session_id: session_id.to_string(),
                    message_id: message_id.clone(),
                    error: error.clone(),
                });
                Ok(GenerationOutcome::Failed { message_id, error })
            }
        }
    }

    async fn write_message(&self, session_id: &str, message: Message) -> Result<()> {
        self.store
            .update_session(
                session_id,
                Box::new(move |mut session: Session| {
                    session.replace_message(message).then_some(session)
                }),
            )
            .await
    }

    /// Best effort after a failed final write: turn the placeholder into an
    /// ERROR message, or failing that undo it, so it never stays streaming.
    async fn settle_placeholder(
        &self,
        ctx: &GenerationContext,
        plan: &GenerationPlan,
        cause: &ParleyError,
    ) {
        let error = plan
            .placeholder
            .finalized(MessageRole::Error, format!("Error: {}", cause), None);
        match self.write_message(ctx.session_id(), error).await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!(
                    "[GenerationOrchestrator] Failed to mark message {} as failed: {}",
                    ctx.message_id(),
                    e
                );
                if let Err(e) = self.roll_back(ctx).await {
                    tracing::error!(
                        "[GenerationOrchestrator] Failed to roll back message {}: {}",
                        ctx.message_id(),
                        e
                    );
                }
            }
        }
    }

    async fn roll_back(&self, ctx: &GenerationContext) -> Result<()> {
        let Some(rollback) = ctx.rollback() else {
            return Ok(());
        };
        self.store
            .update_session(
                ctx.session_id(),
                Box::new(move |session: Session| rollback.apply(session)),
            )
            .await
    }

    fn claim(&self, session_id: &str, message_id: &str) -> Option<PendingSlot<'_>> {
        let mut pending = self.lock_pending();
        if pending.contains_key(session_id) {
            return None;
        }
        let ctx = Arc::new(GenerationContext::new(session_id, message_id));
        pending.insert(session_id.to_string(), Arc::clone(&ctx));
        Some(PendingSlot {
            orchestrator: self,
            ctx,
        })
    }

    /// Removes `ctx` from the pending map if it is still the registered one.
    fn release(&self, ctx: &Arc<GenerationContext>) {
        let mut pending = self.lock_pending();
        if pending
            .get(ctx.session_id())
            .is_some_and(|current| Arc::ptr_eq(current, ctx))
        {
            pending.remove(ctx.session_id());
        }
    }

    fn emit(&self, event: GenerationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, Arc<GenerationContext>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
