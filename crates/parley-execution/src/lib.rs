//! Runtime plumbing for Parley: logging bootstrap and the tracing layer that
//! streams control-plane log events to a UI.

pub mod logging;
pub mod tracing_layer;

pub use logging::{build_layers, init_logging};
pub use tracing_layer::{GenerationEventLayer, LogEvent};
pub use tracing_appender::non_blocking::WorkerGuard;
