//! Tool dispatcher: registry, invocation routing, result aggregation.

use crate::{
    DomainCheckTool, HttpRequestTool, NotesWorkspaceTool, SpreadsheetTool, Tool, WebhookTool,
};
use aria_core::{
    Agent, FunctionDeclaration, IntegrationKind, ToolCall, ToolDispatch, ToolOutcome,
    ToolResponseItem,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Soft deadline for one tool execution.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolved bearer tokens for credentialed integrations. The OAuth dance
/// happens upstream; sessions resolve tokens from the credential store and
/// hand them over here.
#[derive(Debug, Clone, Default)]
pub struct ToolCredentials {
    pub spreadsheet: Option<String>,
    pub notes: Option<String>,
}

/// Routes `ToolCall` envelopes to the tools bound to one agent. The tool set
/// is fixed at construction — i.e. at session open — and never changes
/// mid-session.
pub struct ToolDispatcher {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Build the registry from the agent's enabled action bindings.
    pub fn for_agent(
        agent: &Agent,
        client: reqwest::Client,
        credentials: ToolCredentials,
    ) -> Self {
        let mut dispatcher = Self::new();
        for binding in agent.tool_bindings() {
            match binding.kind {
                IntegrationKind::HttpRequest => {
                    dispatcher.register(Arc::new(HttpRequestTool::new(client.clone())));
                }
                IntegrationKind::DomainCheck => {
                    dispatcher.register(Arc::new(DomainCheckTool::new(client.clone())));
                }
                IntegrationKind::WebhookTrigger => {
                    dispatcher.register(Arc::new(WebhookTool::from_binding(
                        client.clone(),
                        binding,
                    )));
                }
                IntegrationKind::Spreadsheet => {
                    let token = credentials
                        .spreadsheet
                        .clone()
                        .or_else(|| binding.config_str("token").map(str::to_string));
                    dispatcher.register(Arc::new(SpreadsheetTool::from_binding(
                        client.clone(),
                        binding,
                        token,
                    )));
                }
                IntegrationKind::NotesWorkspace => {
                    let token = credentials
                        .notes
                        .clone()
                        .or_else(|| binding.config_str("token").map(str::to_string));
                    dispatcher.register(Arc::new(NotesWorkspaceTool::from_binding(
                        binding,
                        client.clone(),
                        token,
                    )));
                }
                _ => {}
            }
        }
        info!(tools = dispatcher.tools.len(), "tool registry built");
        dispatcher
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one call under the soft deadline and fold any failure into
    /// the response envelope, preserving the call id.
    pub async fn dispatch(&self, call: ToolCall) -> ToolResponseItem {
        let outcome = match self.get(&call.name) {
            None => {
                warn!(tool = %call.name, "unknown tool requested");
                ToolOutcome::err("unknown tool")
            }
            Some(tool) => {
                match tokio::time::timeout(TOOL_TIMEOUT, tool.execute(call.args.clone())).await {
                    Err(_) => ToolOutcome::err("timeout"),
                    Ok(Ok(data)) => ToolOutcome::ok(data),
                    Ok(Err(e)) => ToolOutcome::err(e.to_string()),
                }
            }
        };
        ToolResponseItem {
            id: call.id,
            name: call.name,
            response: outcome,
        }
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ToolDispatch for ToolDispatcher {
    fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    /// Calls within one frame run in parallel; results are aggregated in
    /// call order regardless of completion order.
    async fn dispatch_all(&self, calls: Vec<ToolCall>) -> Vec<ToolResponseItem> {
        futures::future::join_all(calls.into_iter().map(|c| self.dispatch(c))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolExecResult;
    use serde_json::{json, Value};

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "echoes its arguments"
        }
        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "echo".into(),
                description: "echoes its arguments".into(),
                parameters: json!({"type": "object"}),
            }
        }
        async fn execute(&self, args: Value) -> ToolExecResult<Value> {
            Ok(args)
        }
    }

    struct StuckTool;

    #[async_trait::async_trait]
    impl Tool for StuckTool {
        fn name(&self) -> &'static str {
            "stuck"
        }
        fn description(&self) -> &'static str {
            "never finishes"
        }
        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "stuck".into(),
                description: "never finishes".into(),
                parameters: json!({"type": "object"}),
            }
        }
        async fn execute(&self, _args: Value) -> ToolExecResult<Value> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn response_id_matches_call_id() {
        let mut d = ToolDispatcher::new();
        d.register(Arc::new(EchoTool));
        let item = d
            .dispatch(ToolCall::new("t42", "echo", json!({"x": 1})))
            .await;
        assert_eq!(item.id, "t42");
        assert_eq!(item.name, "echo");
        assert!(item.response.success);
        assert_eq!(item.response.data, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_recoverable_result() {
        let d = ToolDispatcher::new();
        let item = d.dispatch(ToolCall::new("t1", "nope", Value::Null)).await;
        assert!(!item.response.success);
        assert_eq!(item.response.error.as_deref(), Some("unknown tool"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let mut d = ToolDispatcher::new();
        d.register(Arc::new(StuckTool));
        let item = d.dispatch(ToolCall::new("t1", "stuck", Value::Null)).await;
        assert!(!item.response.success);
        assert_eq!(item.response.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn batch_results_keep_call_order() {
        let mut d = ToolDispatcher::new();
        d.register(Arc::new(EchoTool));
        let calls = vec![
            ToolCall::new("a", "echo", json!(1)),
            ToolCall::new("b", "nope", Value::Null),
            ToolCall::new("c", "echo", json!(3)),
        ];
        let items = d.dispatch_all(calls).await;
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(items[0].response.success);
        assert!(!items[1].response.success);
    }
}
