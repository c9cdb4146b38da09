//! Application layer for Parley.
//!
//! Coordinates the domain ports into the generation control plane:
//! - [`generation::GenerationOrchestrator`]: one in-flight request per session
//! - [`edit::EditResubmitController`]: local edits and edit-and-regenerate
//! - [`auto_send::AutoSendSequencer`]: repeated sends with error retry
//! - [`session::SessionUpdater`]: the serialized session write path

pub mod auto_send;
pub mod edit;
pub mod generation;
pub mod session;

pub use auto_send::{AutoSendSequencer, AutoSendState};
pub use edit::{EditAction, EditOutcome, EditResubmitController, MessageEdit};
pub use generation::{
    GenerationEvent, GenerationKind, GenerationOrchestrator, GenerationOutcome, SendRequest,
};
pub use session::SessionUpdater;
