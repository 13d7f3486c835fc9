//! Error types for the Aria core library

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the core (configuration, text path, collaborators)
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("config-missing: {0}")]
    ConfigMissing(String),

    #[error("Model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model response error: {0}")]
    Model(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}
