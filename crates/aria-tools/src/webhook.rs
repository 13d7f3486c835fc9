//! `trigger_webhook` — fire one of the agent's bound webhooks, chosen from a
//! natural-language action.
//!
//! Selection rule, in order: first webhook whose description shares a token
//! of at least 3 characters with the action; then first webhook whose
//! configured trigger keywords contain a substring of the action; otherwise
//! the first bound webhook.

use crate::{require_str, Tool, ToolError, ToolExecResult};
use aria_core::{FunctionDeclaration, IntegrationBinding};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// One webhook bound to the agent.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookBinding {
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// Comma-separated keyword list.
    #[serde(default, rename = "triggerKeywords")]
    pub trigger_keywords: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
}

pub struct WebhookTool {
    client: reqwest::Client,
    webhooks: Vec<WebhookBinding>,
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}

/// Pick the webhook for an action per the selection rule. Returns the index
/// plus the matching method for the audit trail.
pub(crate) fn select_webhook(action: &str, webhooks: &[WebhookBinding]) -> Option<(usize, &'static str)> {
    if webhooks.is_empty() {
        return None;
    }
    let action_tokens = tokens(action);
    let action_lower = action.to_lowercase();

    for (i, hook) in webhooks.iter().enumerate() {
        let desc_tokens = tokens(&hook.description);
        if action_tokens.iter().any(|t| desc_tokens.contains(t)) {
            return Some((i, "description token"));
        }
    }
    for (i, hook) in webhooks.iter().enumerate() {
        let matched = hook
            .trigger_keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .any(|k| action_lower.contains(&k.to_lowercase()));
        if matched {
            return Some((i, "trigger keyword"));
        }
    }
    Some((0, "fallback first"))
}

impl WebhookTool {
    pub fn new(client: reqwest::Client, webhooks: Vec<WebhookBinding>) -> Self {
        Self { client, webhooks }
    }

    /// Read the `webhooks` array out of a webhook-trigger binding's config.
    pub fn from_binding(client: reqwest::Client, binding: &IntegrationBinding) -> Self {
        let webhooks = binding
            .config
            .get("webhooks")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self::new(client, webhooks)
    }
}

#[async_trait::async_trait]
impl Tool for WebhookTool {
    fn name(&self) -> &'static str {
        "trigger_webhook"
    }

    fn description(&self) -> &'static str {
        "POST to one of this agent's bound webhooks, chosen by natural-language action"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().into(),
            description: self.description().into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "description": "What the user wants to trigger, in plain language",
                    },
                },
                "required": ["action"],
            }),
        }
    }

    async fn execute(&self, args: Value) -> ToolExecResult<Value> {
        let action = require_str(&args, "action")?;
        let (index, matched_by) = select_webhook(action, &self.webhooks)
            .ok_or_else(|| ToolError::Failed("no webhooks bound to this agent".into()))?;
        let hook = &self.webhooks[index];
        info!(url = %hook.url, matched_by, "webhook selected");

        let mut request = self.client.post(&hook.url);
        if let Some(headers) = &hook.headers {
            for (name, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(name, v);
                }
            }
        }
        let payload = hook
            .payload
            .clone()
            .unwrap_or_else(|| json!({"action": action}));
        let response = request.json(&payload).send().await?;
        let status = response.status().as_u16();
        debug!(status, "webhook fired");

        Ok(json!({
            "url": hook.url,
            "matchedBy": matched_by,
            "status": status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hooks() -> Vec<WebhookBinding> {
        vec![
            WebhookBinding {
                url: "https://hooks.test/a".into(),
                description: "activate marketing campaign".into(),
                ..Default::default()
            },
            WebhookBinding {
                url: "https://hooks.test/b".into(),
                trigger_keywords: "deploy,release".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn keyword_substring_selects_second_hook() {
        let (i, how) = select_webhook("please deploy the build", &hooks()).unwrap();
        assert_eq!(i, 1);
        assert_eq!(how, "trigger keyword");
    }

    #[test]
    fn description_token_selects_first_hook() {
        let (i, how) = select_webhook("kick off marketing", &hooks()).unwrap();
        assert_eq!(i, 0);
        assert_eq!(how, "description token");
    }

    #[test]
    fn unmatched_action_falls_back_to_first() {
        let (i, how) = select_webhook("do the thing", &hooks()).unwrap();
        assert_eq!(i, 0);
        assert_eq!(how, "fallback first");
    }

    #[test]
    fn short_tokens_do_not_match() {
        // "ad" is under the 3-character floor
        let hooks = vec![
            WebhookBinding {
                url: "https://hooks.test/x".into(),
                description: "no overlap here".into(),
                ..Default::default()
            },
            WebhookBinding {
                url: "https://hooks.test/y".into(),
                description: "ad campaign".into(),
                ..Default::default()
            },
        ];
        let (i, how) = select_webhook("run ad", &hooks).unwrap();
        assert_eq!(i, 0);
        assert_eq!(how, "fallback first");
    }

    #[test]
    fn empty_webhook_list_yields_none() {
        assert!(select_webhook("anything", &[]).is_none());
    }
}
