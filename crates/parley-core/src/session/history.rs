//! Helpers for slicing a message list into request history.

use super::message::{Message, MessageRole};

/// Index of the nearest user message strictly before `index`.
pub fn preceding_user_index(messages: &[Message], index: usize) -> Option<usize> {
    messages[..index.min(messages.len())]
        .iter()
        .rposition(|m| m.role == MessageRole::User)
}

/// History view for asking the service to speak as the user.
///
/// User turns are presented as model turns and model turns as user turns, so
/// the service continues the human side. Error messages and unfinished
/// placeholders are dropped.
pub fn role_flipped(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| !m.is_streaming && m.role != MessageRole::Error)
        .map(|m| {
            let mut flipped = m.clone();
            flipped.role = match m.role {
                MessageRole::User => MessageRole::Model,
                _ => MessageRole::User,
            };
            flipped
        })
        .collect()
}
