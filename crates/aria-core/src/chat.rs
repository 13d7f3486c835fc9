//! Text conversation path.
//!
//! Reuses the context builder and tool dispatcher over the single-shot
//! completion endpoint. Each user message makes at most two model requests:
//! one that may return function calls, and one follow-up carrying their
//! results.

use crate::agent::Agent;
use crate::config::CoreConfig;
use crate::context;
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{refresh_snapshots, SnapshotCache};
use crate::tooling::{ToolCall, ToolDispatch, ToolResponseItem};
use crate::transcript::Transcript;
use serde_json::{json, Value};
use tracing::{debug, info};

/// One text chat with an agent. Holds the transcript for the session;
/// snapshots are refreshed once, at the first message (chat-start).
pub struct TextSession<'a> {
    agent: &'a Agent,
    config: &'a CoreConfig,
    dispatcher: &'a dyn ToolDispatch,
    cache: &'a SnapshotCache,
    client: reqwest::Client,
    transcript: Transcript,
    refreshed: bool,
}

impl<'a> TextSession<'a> {
    pub fn new(
        agent: &'a Agent,
        config: &'a CoreConfig,
        dispatcher: &'a dyn ToolDispatch,
        cache: &'a SnapshotCache,
        client: reqwest::Client,
    ) -> Self {
        Self {
            agent,
            config,
            dispatcher,
            cache,
            client,
            transcript: Transcript::new(),
            refreshed: false,
        }
    }

    /// Resume with a transcript from an earlier exchange.
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Send one user message and return the agent's reply.
    pub async fn send(&mut self, user_text: &str) -> CoreResult<String> {
        if !self.refreshed {
            refresh_snapshots(self.agent, self.cache, &self.client).await;
            self.refreshed = true;
        }

        let snapshots = self.cache.for_agent(self.agent);
        let prompt = context::text_prompt(self.agent, &snapshots, &self.transcript, user_text);
        let declarations = self.dispatcher.declarations();

        let mut contents = vec![json!({"role": "user", "parts": [{"text": prompt}]})];
        let first = self.request(&contents, &declarations).await?;
        let (mut text, calls) = split_parts(&first)?;

        if !calls.is_empty() {
            info!(count = calls.len(), "text path: dispatching function calls");
            let model_parts = first
                .pointer("/candidates/0/content/parts")
                .cloned()
                .unwrap_or_else(|| json!([]));
            let results = self.dispatcher.dispatch_all(calls).await;
            contents.push(json!({"role": "model", "parts": model_parts}));
            contents.push(json!({"role": "user", "parts": response_parts(&results)}));

            let second = self.request(&contents, &declarations).await?;
            let (final_text, _) = split_parts(&second)?;
            text = final_text;
        }

        if text.trim().is_empty() {
            return Err(CoreError::Model("model returned no text".into()));
        }
        self.transcript.push_user(user_text);
        self.transcript.push_agent(text.clone());
        Ok(text)
    }

    async fn request(
        &self,
        contents: &[Value],
        declarations: &[crate::tooling::FunctionDeclaration],
    ) -> CoreResult<Value> {
        let mut body = json!({"contents": contents});
        if !declarations.is_empty() {
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }
        debug!(contents = contents.len(), "text path: model request");
        let response = self
            .client
            .post(&self.config.text_endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Model(format!("endpoint returned {status}: {body}")));
        }
        Ok(response.json().await?)
    }
}

/// Split the first candidate's parts into concatenated text and function
/// calls. Function calls get sequential ids; the single-shot endpoint does
/// not assign any.
fn split_parts(response: &Value) -> CoreResult<(String, Vec<ToolCall>)> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| CoreError::Model("response has no candidate parts".into()))?;

    let mut text = String::new();
    let mut calls = Vec::new();
    for part in parts {
        if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(t);
        }
        if let Some(fc) = part.get("functionCall") {
            let name = fc
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| CoreError::Model("functionCall without a name".into()))?;
            let args = fc.get("args").cloned().unwrap_or(Value::Null);
            calls.push(ToolCall::new(format!("call-{}", calls.len()), name, args));
        }
    }
    Ok((text, calls))
}

fn response_parts(results: &[ToolResponseItem]) -> Vec<Value> {
    results
        .iter()
        .map(|r| {
            json!({
                "functionResponse": {
                    "name": r.name,
                    "response": r.response,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parts_collects_text_and_calls() {
        let response = json!({
            "candidates": [{"content": {"parts": [
                {"text": "Checking that "},
                {"functionCall": {"name": "make_api_request", "args": {"url": "https://x.test"}}},
                {"text": "now."},
            ]}}]
        });
        let (text, calls) = split_parts(&response).unwrap();
        assert_eq!(text, "Checking that now.");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call-0");
        assert_eq!(calls[0].name, "make_api_request");
        assert_eq!(calls[0].args["url"], "https://x.test");
    }

    #[test]
    fn split_parts_rejects_empty_candidates() {
        assert!(split_parts(&json!({"candidates": []})).is_err());
    }

    #[test]
    fn response_parts_carry_tool_outcomes() {
        use crate::tooling::ToolOutcome;
        let items = vec![ToolResponseItem {
            id: "call-0".into(),
            name: "make_api_request".into(),
            response: ToolOutcome::ok(json!({"status": 200})),
        }];
        let parts = response_parts(&items);
        assert_eq!(parts[0]["functionResponse"]["name"], "make_api_request");
        assert_eq!(
            parts[0]["functionResponse"]["response"]["success"],
            json!(true)
        );
    }
}
