//! # Aria Tools
//!
//! The tool side of the in-band function-calling protocol: a [`Tool`] trait,
//! concrete tools for each action integration kind, and a [`ToolDispatcher`]
//! that declares the bound tools to the model and routes `ToolCall`
//! envelopes to them.
//!
//! Every tool takes a `serde_json::Value` argument mapping and returns a
//! JSON payload; errors are folded into the response envelope so the model
//! can narrate them — they never tear down a session.

mod dispatcher;
mod domain_check;
mod error;
mod http_request;
mod notes;
mod spreadsheet;
mod webhook;

pub use dispatcher::{ToolCredentials, ToolDispatcher, TOOL_TIMEOUT};
pub use domain_check::DomainCheckTool;
pub use error::{ToolError, ToolExecResult};
pub use http_request::HttpRequestTool;
pub use notes::NotesWorkspaceTool;
pub use spreadsheet::SpreadsheetTool;
pub use webhook::{WebhookBinding, WebhookTool};

use aria_core::FunctionDeclaration;
use serde_json::Value;

/// One callable tool bound to the active agent.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Tool name exactly as declared to the model.
    fn name(&self) -> &'static str;

    /// Human-readable description (also used in the declaration).
    fn description(&self) -> &'static str;

    /// Function declaration: name, description, JSON-schema parameters.
    fn declaration(&self) -> FunctionDeclaration;

    /// Execute with the model-supplied argument mapping.
    async fn execute(&self, args: Value) -> ToolExecResult<Value>;
}

/// Required-string lookup shared by the tool implementations.
pub(crate) fn require_str<'a>(args: &'a Value, key: &'static str) -> ToolExecResult<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ToolError::MissingArg(key))
}
