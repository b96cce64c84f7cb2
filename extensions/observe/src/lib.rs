//! Observability for Turnstile: `tracing-subscriber` setup and a logging sink.

use tracing_subscriber::EnvFilter;
use turnstile_core::effect::{CompletionEvent, CompletionSink, Effect, EffectSink};

const DEFAULT_FILTER: &str = "info,turnstile_core=debug,turnstile_runtime=debug";

fn filter(default: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.unwrap_or(DEFAULT_FILTER)))
}

/// Initialize a simple stdout tracing subscriber for development.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init_stdout_tracing(default_filter: Option<&str>) -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Initialize a JSON-lines subscriber, one object per event.
pub fn init_json_tracing(default_filter: Option<&str>) -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_env_filter(filter(default_filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Logs every effect and completion through `tracing`.
///
/// Stands in for the host when nothing renders the effects, e.g. when
/// replaying a scenario from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EffectSink for LogSink {
    fn dispatch(&self, effect: Effect) {
        let payload = serde_json::to_string(&effect).unwrap_or_default();
        tracing::info!(target: "turnstile::effect", activation = %effect.activation(), %payload, "Effect");
    }
}

impl CompletionSink for LogSink {
    fn completed(&self, event: CompletionEvent) {
        tracing::info!(
            target: "turnstile::completion",
            flow = %event.flow,
            activation = %event.activation,
            completion = ?event.completion,
            at = %event.completed_at,
            "Flow completed"
        );
    }
}
