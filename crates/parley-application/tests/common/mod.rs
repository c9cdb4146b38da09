//! Shared fixtures for the application tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parley_application::{GenerationEvent, GenerationOrchestrator, SessionUpdater};
use parley_core::completion::{
    CompletionClient, CompletionError, CompletionRequest, CompletionResponse, MimicRequest,
};
use parley_core::config::GenerationConfig;
use parley_core::context_cache::{ContextCache, ContextKey};
use parley_core::notify::AiMessageNotifier;
use parley_core::error::{ParleyError, Result as ParleyResult};
use parley_core::session::{
    GenerationSettings, Message, Session, SessionMutation, SessionStore,
};
use parley_infrastructure::MemorySessionRepository;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// One scripted answer of the mock completion client.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail(String),
    /// The stream ends without a response or an error.
    Anomaly,
    /// Never answers; returns only once cancelled.
    Hang,
    /// Ignores the token and answers after the delay.
    Late(String, Duration),
}

pub fn reply(text: &str) -> Script {
    Script::Reply(text.to_string())
}

pub fn fail(message: &str) -> Script {
    Script::Fail(message.to_string())
}

/// Completion client answering from a script, then with a fallback.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Script>>,
    fallback: Script,
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub mimic_requests: Mutex<Vec<MimicRequest>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Script>) -> Self {
        Self::with_fallback(script, reply("ok"))
    }

    pub fn with_fallback(script: Vec<Script>, fallback: Script) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            mimic_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len() + self.mimic_requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn next(&self) -> Script {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn play(
        script: Script,
        cancel: CancellationToken,
    ) -> Result<Option<String>, CompletionError> {
        match script {
            Script::Reply(text) => Ok(Some(text)),
            Script::Fail(message) => Err(CompletionError::service(message)),
            Script::Anomaly => Ok(None),
            Script::Hang => {
                cancel.cancelled().await;
                Err(CompletionError::Cancelled)
            }
            Script::Late(text, delay) => {
                tokio::time::sleep(delay).await;
                Ok(Some(text))
            }
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<Option<CompletionResponse>, CompletionError> {
        self.requests.lock().unwrap().push(request);
        let script = self.next();
        Ok(Self::play(script, cancel).await?.map(CompletionResponse::text))
    }

    async fn mimic_user(
        &self,
        request: MimicRequest,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError> {
        self.mimic_requests.lock().unwrap().push(request);
        let script = self.next();
        Ok(Self::play(script, cancel).await?.unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingCache {
    pub invalidated: Mutex<Vec<ContextKey>>,
}

#[async_trait]
impl ContextCache for RecordingCache {
    async fn invalidate(&self, key: &ContextKey) {
        self.invalidated.lock().unwrap().push(key.clone());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<Message>>,
}

impl AiMessageNotifier for RecordingNotifier {
    fn notify_new_ai_message(&self, message: &Message) {
        self.messages.lock().unwrap().push(message.clone());
    }
}

/// Store whose listed writes (1-based) fail.
pub struct FlakyStore {
    inner: Arc<SessionUpdater>,
    failing: Vec<usize>,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_writes(inner: Arc<SessionUpdater>, failing: &[usize]) -> Self {
        Self {
            inner,
            failing: failing.to_vec(),
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn load(&self, session_id: &str) -> ParleyResult<Option<Session>> {
        self.inner.load(session_id).await
    }

    async fn update_session(
        &self,
        session_id: &str,
        mutate: SessionMutation,
    ) -> ParleyResult<()> {
        let write = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(&write) {
            return Err(ParleyError::io("disk full"));
        }
        self.inner.update_session(session_id, mutate).await
    }
}

/// Store that holds its first write until the gate opens.
pub struct GatedStore {
    inner: Arc<SessionUpdater>,
    pub entered: Arc<Notify>,
    pub gate: Arc<Semaphore>,
    first: AtomicBool,
}

impl GatedStore {
    pub fn new(inner: Arc<SessionUpdater>, entered: Arc<Notify>, gate: Arc<Semaphore>) -> Self {
        Self {
            inner,
            entered,
            gate,
            first: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl SessionStore for GatedStore {
    async fn load(&self, session_id: &str) -> ParleyResult<Option<Session>> {
        self.inner.load(session_id).await
    }

    async fn update_session(
        &self,
        session_id: &str,
        mutate: SessionMutation,
    ) -> ParleyResult<()> {
        if self.first.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await.unwrap();
        }
        self.inner.update_session(session_id, mutate).await
    }
}

pub struct Harness {
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub store: Arc<SessionUpdater>,
    pub client: Arc<ScriptedClient>,
    pub cache: Arc<RecordingCache>,
    pub notifier: Arc<RecordingNotifier>,
    pub session_id: String,
}

impl Harness {
    pub fn new(session: Session, script: Vec<Script>) -> Self {
        Self::with_client(session, ScriptedClient::new(script))
    }

    pub fn with_client(session: Session, client: ScriptedClient) -> Self {
        Self::with_store(session, client, |store| store as Arc<dyn SessionStore>)
    }

    /// Builds the orchestrator over a store wrapping the session updater.
    pub fn with_store<F>(session: Session, client: ScriptedClient, wrap: F) -> Self
    where
        F: FnOnce(Arc<SessionUpdater>) -> Arc<dyn SessionStore>,
    {
        let session_id = session.id.clone();
        let repository = MemorySessionRepository::with_sessions([session]);
        let store = Arc::new(SessionUpdater::new(Arc::new(repository)));
        let client = Arc::new(client);
        let cache = Arc::new(RecordingCache::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let orchestrator = GenerationOrchestrator::new(
            wrap(store.clone()),
            client.clone(),
            GenerationConfig::default(),
        )
        .with_context_cache(cache.clone())
        .with_notifier(notifier.clone());

        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            client,
            cache,
            notifier,
            session_id,
        }
    }

    pub async fn session(&self) -> Session {
        self.store.load(&self.session_id).await.unwrap().unwrap()
    }
}

pub fn empty_session() -> Session {
    Session::new("test-model", GenerationSettings::default())
}

pub fn session_with(messages: Vec<Message>) -> Session {
    let mut session = empty_session();
    session.messages = messages;
    session
}

/// Waits until a generation has written its placeholder and started the call.
pub async fn wait_started(events: &mut broadcast::Receiver<GenerationEvent>) -> String {
    loop {
        if let GenerationEvent::Started { message_id, .. } = events.recv().await.unwrap() {
            return message_id;
        }
    }
}
