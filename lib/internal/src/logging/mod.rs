pub mod stdout;
pub mod utils;

use graphql_authz_config::log::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::logging::{stdout::build_stdout_layer, utils::DynLayer};

#[derive(Debug, thiserror::Error)]
pub enum LoggingInitError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, String),
    #[error("A global logger is already installed")]
    AlreadyInitialized,
}

pub fn logging_layer_from_config<S>(
    config: &LoggingConfig,
) -> Result<(DynLayer<S>, WorkerGuard), LoggingInitError>
where
    S: tracing::Subscriber
        + for<'span> tracing_subscriber::registry::LookupSpan<'span>
        + Send
        + Sync,
{
    build_stdout_layer(config)
}

/// Installs the global subscriber. The returned guard flushes buffered logs on drop.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard, LoggingInitError> {
    let (layer, guard) = logging_layer_from_config(config)?;

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|_| LoggingInitError::AlreadyInitialized)?;

    Ok(guard)
}
