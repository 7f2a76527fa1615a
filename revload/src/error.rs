use crate::client::TransportError;
use revload_core::ConfigError;
use thiserror::Error;

/// Anything that prevents a load test from starting.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
