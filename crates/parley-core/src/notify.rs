//! Hand-off of finished model messages to the speech collaborator.

use crate::session::Message;

/// Receives each newly finalized model message.
///
/// Calls are fire-and-forget. Implementations must not block and must swallow
/// their own failures.
pub trait AiMessageNotifier: Send + Sync {
    fn notify_new_ai_message(&self, message: &Message);
}

/// Notifier that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl AiMessageNotifier for NullNotifier {
    fn notify_new_ai_message(&self, _message: &Message) {}
}
