//! Domain layer for Parley.
//!
//! Holds the conversation model (sessions, messages, personas), configuration
//! types, and the ports the generation control plane talks through:
//! [`session::SessionStore`], [`completion::CompletionClient`],
//! [`context_cache::ContextCache`] and [`notify::AiMessageNotifier`].

pub mod completion;
pub mod config;
pub mod context_cache;
pub mod error;
pub mod notify;
pub mod persona;
pub mod session;

// Re-export common error type
pub use error::{ParleyError, Result};
