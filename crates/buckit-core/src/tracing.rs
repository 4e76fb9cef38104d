//! Tracing initialization for the service binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines with targets.
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

impl LogFormat {
    /// JSON when running inside Kubernetes, text otherwise.
    pub fn detect() -> Self {
        Self::from_env_keys(std::env::vars().map(|(k, _)| k))
    }

    fn from_env_keys<I: IntoIterator<Item = String>>(keys: I) -> Self {
        if keys.into_iter().any(|k| k.contains("KUBERNETES")) {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Build the level filter from `RUST_LOG`, falling back to `LOG_LEVEL`, then `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOG_LEVEL")
                .map_err(|_| ())
                .and_then(|level| EnvFilter::try_new(level.to_lowercase()).map_err(|_| ()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
pub fn init_tracing() {
    let registry = tracing_subscriber::registry().with(env_filter());

    match LogFormat::detect() {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}
