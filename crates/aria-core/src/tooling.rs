//! Tool-call envelopes and the dispatch seam.
//!
//! The model issues `ToolCall`s in-band; whatever executes them answers with
//! a response item carrying the same call id. The dispatcher itself lives in
//! a separate crate and plugs in through [`ToolDispatch`], so the text and
//! voice paths share one implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function call issued by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Success-or-error payload of one tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// One entry of a `tool-response` envelope. `id` always equals the
/// originating call's id; anything else is a protocol error on our side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponseItem {
    pub id: String,
    pub name: String,
    pub response: ToolOutcome,
}

/// Function declaration handed to the model at session open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the argument mapping.
    pub parameters: Value,
}

/// Dispatch seam shared by the text and voice sessions.
#[async_trait::async_trait]
pub trait ToolDispatch: Send + Sync {
    /// Declarations for every tool bound to the active agent. Fixed for the
    /// lifetime of a session.
    fn declarations(&self) -> Vec<FunctionDeclaration>;

    /// Execute a batch of calls in parallel; results come back in call
    /// order, one item per call, ids preserved.
    async fn dispatch_all(&self, calls: Vec<ToolCall>) -> Vec<ToolResponseItem>;
}
