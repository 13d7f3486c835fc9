//! `manage_notes_workspace` — search/create/update pages and query
//! databases in the agent's bound notes workspace.
//!
//! Databases may be addressed by name or id; names are resolved through the
//! workspace search endpoint first.

use crate::{require_str, Tool, ToolError, ToolExecResult};
use aria_core::{AccessLevel, FunctionDeclaration, IntegrationBinding};
use serde_json::{json, Value};
use tracing::debug;

const NOTES_BASE: &str = "https://api.notion.com/v1";
const NOTES_VERSION: &str = "2022-06-28";

pub struct NotesWorkspaceTool {
    client: reqwest::Client,
    token: Option<String>,
    access: AccessLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotesOp {
    Search,
    CreatePage,
    UpdatePage,
    QueryDatabase,
}

impl NotesOp {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "search" => Some(NotesOp::Search),
            "create_page" => Some(NotesOp::CreatePage),
            "update_page" => Some(NotesOp::UpdatePage),
            "query_database" => Some(NotesOp::QueryDatabase),
            _ => None,
        }
    }

    fn mutates(&self) -> bool {
        matches!(self, NotesOp::CreatePage | NotesOp::UpdatePage)
    }
}

/// A 32-hex-digit value (dashes ignored) is an id, not a name.
fn looks_like_id(s: &str) -> bool {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

impl NotesWorkspaceTool {
    pub fn from_binding(
        binding: &IntegrationBinding,
        client: reqwest::Client,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            token,
            access: binding.access_level(),
        }
    }

    fn token(&self) -> ToolExecResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ToolError::Failed("no notes workspace credential configured".into()))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> ToolExecResult<reqwest::RequestBuilder> {
        Ok(self
            .client
            .request(method, format!("{NOTES_BASE}{path}"))
            .bearer_auth(self.token()?)
            .header("Notion-Version", NOTES_VERSION))
    }

    async fn search(&self, query: &str, filter_databases: bool) -> ToolExecResult<Value> {
        let mut body = json!({"query": query, "page_size": 10});
        if filter_databases {
            body["filter"] = json!({"property": "object", "value": "database"});
        }
        let response = self
            .request(reqwest::Method::POST, "/search")?
            .json(&body)
            .send()
            .await?;
        expect_json(response).await
    }

    /// Resolve a database reference to an id, searching by title when the
    /// reference is not already an id.
    async fn resolve_database_id(&self, reference: &str) -> ToolExecResult<String> {
        if looks_like_id(reference) {
            return Ok(reference.to_string());
        }
        let found = self.search(reference, true).await?;
        found
            .get("results")
            .and_then(|r| r.as_array())
            .and_then(|arr| arr.first())
            .and_then(|db| db.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| ToolError::Failed(format!("no database named '{reference}'")))
    }
}

async fn expect_json(response: reqwest::Response) -> ToolExecResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::Failed(format!(
            "notes API returned {status}: {body}"
        )));
    }
    Ok(response.json().await?)
}

/// Plain text becomes one paragraph block.
fn paragraph_blocks(content: &str) -> Value {
    json!([{
        "object": "block",
        "type": "paragraph",
        "paragraph": {"rich_text": [{"type": "text", "text": {"content": content}}]},
    }])
}

#[async_trait::async_trait]
impl Tool for NotesWorkspaceTool {
    fn name(&self) -> &'static str {
        "manage_notes_workspace"
    }

    fn description(&self) -> &'static str {
        "Search, create, or update pages and query databases in the bound notes workspace"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().into(),
            description: self.description().into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["search", "create_page", "update_page", "query_database"],
                    },
                    "query": {"type": "string"},
                    "pageId": {"type": "string"},
                    "databaseId": {"type": "string", "description": "Database name or id"},
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                    "properties": {"type": "object"},
                    "filter": {"type": "object"},
                    "sorts": {"type": "array"},
                },
                "required": ["operation"],
            }),
        }
    }

    async fn execute(&self, args: Value) -> ToolExecResult<Value> {
        let op = NotesOp::parse(require_str(&args, "operation")?).ok_or_else(|| {
            ToolError::InvalidArg(
                "operation must be search/create_page/update_page/query_database".into(),
            )
        })?;
        if op.mutates() && self.access == AccessLevel::ReadOnly {
            return Err(ToolError::ReadOnly);
        }
        debug!(op = ?op, "manage_notes_workspace");

        match op {
            NotesOp::Search => {
                let query = require_str(&args, "query")?;
                self.search(query, false).await
            }
            NotesOp::QueryDatabase => {
                let reference = require_str(&args, "databaseId")?;
                let id = self.resolve_database_id(reference).await?;
                let mut body = json!({});
                if let Some(filter) = args.get("filter").filter(|f| !f.is_null()) {
                    body["filter"] = filter.clone();
                }
                if let Some(sorts) = args.get("sorts").filter(|s| !s.is_null()) {
                    body["sorts"] = sorts.clone();
                }
                let response = self
                    .request(reqwest::Method::POST, &format!("/databases/{id}/query"))?
                    .json(&body)
                    .send()
                    .await?;
                expect_json(response).await
            }
            NotesOp::CreatePage => {
                let title = require_str(&args, "title")?;
                let mut body = json!({
                    "properties": {
                        "title": {"title": [{"type": "text", "text": {"content": title}}]},
                    },
                });
                if let Some(reference) = args.get("databaseId").and_then(|d| d.as_str()) {
                    let id = self.resolve_database_id(reference).await?;
                    body["parent"] = json!({"database_id": id});
                    if let Some(props) = args.get("properties").filter(|p| p.is_object()) {
                        body["properties"] = props.clone();
                    }
                } else {
                    let parent = require_str(&args, "pageId")?;
                    body["parent"] = json!({"page_id": parent});
                }
                if let Some(content) = args.get("content").and_then(|c| c.as_str()) {
                    body["children"] = paragraph_blocks(content);
                }
                let response = self
                    .request(reqwest::Method::POST, "/pages")?
                    .json(&body)
                    .send()
                    .await?;
                expect_json(response).await
            }
            NotesOp::UpdatePage => {
                let page_id = require_str(&args, "pageId")?;
                if let Some(content) = args.get("content").and_then(|c| c.as_str()) {
                    let response = self
                        .request(
                            reqwest::Method::PATCH,
                            &format!("/blocks/{page_id}/children"),
                        )?
                        .json(&json!({"children": paragraph_blocks(content)}))
                        .send()
                        .await?;
                    return expect_json(response).await;
                }
                let properties = args
                    .get("properties")
                    .filter(|p| p.is_object())
                    .ok_or(ToolError::MissingArg("properties"))?;
                let response = self
                    .request(reqwest::Method::PATCH, &format!("/pages/{page_id}"))?
                    .json(&json!({"properties": properties}))
                    .send()
                    .await?;
                expect_json(response).await
            }
        }
    }
}
