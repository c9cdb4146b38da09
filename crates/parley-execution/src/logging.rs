//! Logging bootstrap.
//!
//! Installs a registry with a console layer, an optional daily-rolling file
//! layer, and an optional [`GenerationEventLayer`]. `RUST_LOG` wins over the
//! configured level.

use crate::tracing_layer::GenerationEventLayer;
use parley_core::config::LoggingConfig;
use parley_core::{ParleyError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const LOG_FILE_PREFIX: &str = "parley.log";

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Builds the layer stack described by `config`.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn build_layers(
    config: &LoggingConfig,
    events: Option<GenerationEventLayer>,
) -> (Vec<BoxedLayer>, Option<WorkerGuard>) {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.level))
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.level))
            .boxed()
    };
    layers.push(console);

    let guard = config.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter(&config.level))
                .boxed(),
        );
        guard
    });

    if let Some(layer) = events {
        layers.push(
            layer
                .with_filter(filter_fn(|meta| {
                    GenerationEventLayer::is_parley_target(meta.target())
                }))
                .boxed(),
        );
    }

    (layers, guard)
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns a config error when a global subscriber is already set.
pub fn init_logging(
    config: &LoggingConfig,
    events: Option<GenerationEventLayer>,
) -> Result<Option<WorkerGuard>> {
    let (layers, guard) = build_layers(config, events);

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| ParleyError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}
