use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directives}': {source}")]
    Filter {
        directives: String,
        #[source]
        source: ParseError,
    },

    #[error("could not install log subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Directives from `RUST_LOG` when set and non-empty, else the `--log-level` value.
fn filter_for(env_directives: Option<String>, log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = env_directives
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| log_level.to_string());
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter { directives, source })
}

/// Route engine events to stderr so stdout stays machine-readable.
pub fn init(log_level: &str) -> Result<(), TelemetryError> {
    let filter = filter_for(std::env::var(EnvFilter::DEFAULT_ENV).ok(), log_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Install)
}
