//! Generation control plane.
//!
//! [`GenerationOrchestrator`] owns the one-request-per-session rule, the
//! placeholder lifecycle, rollback, and cancellation. Every entry point maps to
//! a [`GenerationKind`] and runs through the same state machine.

mod context;
mod events;
mod kind;
mod orchestrator;
mod plan;
mod telemetry;

pub use events::GenerationEvent;
pub use kind::{GenerationKind, GenerationOutcome, SendRequest};
pub use orchestrator::GenerationOrchestrator;
pub use telemetry::{GenerationTelemetry, format_elapsed};
