//! Error types for tool execution.
//!
//! Tool errors are never surfaced to the user directly; the dispatcher folds
//! them into `ToolOutcome`s so the model can narrate them.

use thiserror::Error;

pub type ToolExecResult<T> = Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown tool")]
    Unknown,

    #[error("timeout")]
    Timeout,

    #[error("missing required argument '{0}'")]
    MissingArg(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("read-only")]
    ReadOnly,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Failed(String),
}
