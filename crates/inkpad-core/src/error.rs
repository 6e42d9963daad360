//! Error types for inkpad-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::gateway::GatewayError;

/// Result type alias using inkpad-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in inkpad-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Backend gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Auth/session error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note or group not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
