//! Session domain module.
//!
//! This module contains all session-related domain models and repository
//! interfaces.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`)
//! - `message`: Conversation message types (`MessageRole`, `Message`, `Attachment`)
//! - `settings`: Generation settings and request overrides
//! - `history`: Slicing helpers used to build request history
//! - `repository`: Persistence traits (`SessionRepository`, `SessionStore`)

pub mod history;
mod message;
mod model;
mod repository;
mod settings;

// Re-export public API
pub use message::{Attachment, Message, MessageRole, new_message_id};
pub use model::{DEFAULT_SESSION_TITLE, Session, derive_title};
pub use repository::{SessionMutation, SessionRepository, SessionStore};
pub use settings::{GenerationSettings, SafetySettings, SafetyThreshold, SettingsOverride};
