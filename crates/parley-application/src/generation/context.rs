//! Per-request generation state.
//!
//! Each in-flight request owns one `GenerationContext`. Cancellation and
//! completion race on its state word; whichever transition wins decides what
//! reaches the session.

use parley_core::session::{Message, Session};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const RUNNING: u8 = 0;
const FINISHING: u8 = 1;
const CANCELLED: u8 = 2;

/// How to undo the placeholder write of a generation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rollback {
    /// Put back the message list as it was, provided the placeholder is still there.
    RestoreList {
        placeholder_id: String,
        messages: Vec<Message>,
    },
    /// Put back the message that was overwritten by the placeholder.
    RestoreMessage(Message),
}

impl Rollback {
    /// Applies the rollback. `None` when there is nothing left to undo.
    pub(crate) fn apply(self, mut session: Session) -> Option<Session> {
        match self {
            Self::RestoreList {
                placeholder_id,
                messages,
            } => {
                session.index_of(&placeholder_id)?;
                session.messages = messages;
                Some(session)
            }
            Self::RestoreMessage(original) => {
                let current = session.message(&original.id)?;
                if *current == original {
                    return None;
                }
                session.replace_message(original);
                Some(session)
            }
        }
    }
}

/// State of one in-flight generation.
#[derive(Debug)]
pub struct GenerationContext {
    session_id: String,
    message_id: String,
    started_at: Instant,
    token: CancellationToken,
    state: AtomicU8,
    rollback: Mutex<Option<Rollback>>,
    rollback_claimed: AtomicBool,
}

impl GenerationContext {
    pub(crate) fn new(session_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: message_id.into(),
            started_at: Instant::now(),
            token: CancellationToken::new(),
            state: AtomicU8::new(RUNNING),
            rollback: Mutex::new(None),
            rollback_claimed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Id of the message being produced or overwritten.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    /// RUNNING → CANCELLED. Fires the token when the transition wins.
    pub(crate) fn try_cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.token.cancel();
        }
        won
    }

    /// RUNNING → FINISHING. A late result loses against a prior cancel.
    pub(crate) fn try_finish(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, FINISHING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn set_rollback(&self, rollback: Rollback) {
        *self.lock_rollback() = Some(rollback);
    }

    pub(crate) fn rollback(&self) -> Option<Rollback> {
        self.lock_rollback().clone()
    }

    pub(crate) fn has_placeholder(&self) -> bool {
        self.lock_rollback().is_some()
    }

    /// True for exactly one caller; that caller performs the rollback write.
    pub(crate) fn claim_rollback(&self) -> bool {
        !self.rollback_claimed.swap(true, Ordering::SeqCst)
    }

    fn lock_rollback(&self) -> std::sync::MutexGuard<'_, Option<Rollback>> {
        self.rollback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
