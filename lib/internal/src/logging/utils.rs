use tracing_subscriber::{EnvFilter, Layer};

use super::LoggingInitError;

pub type DynLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

pub fn create_env_filter(filter: &str) -> Result<EnvFilter, LoggingInitError> {
    EnvFilter::try_new(filter)
        .map_err(|err| LoggingInitError::InvalidFilter(filter.to_string(), err.to_string()))
}
