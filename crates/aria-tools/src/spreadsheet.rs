//! `manage_spreadsheet` — read/write/append/search/info/clear against the
//! spreadsheet bound to the agent.
//!
//! Talks to the Sheets REST surface with the agent's configured bearer
//! token. A read-only binding rejects every mutating operation before any
//! network traffic happens.

use crate::{require_str, Tool, ToolError, ToolExecResult};
use aria_core::{AccessLevel, FunctionDeclaration, IntegrationBinding};
use serde_json::{json, Value};
use tracing::debug;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_RANGE: &str = "A1:Z1000";

pub struct SpreadsheetTool {
    client: reqwest::Client,
    spreadsheet_id: String,
    token: Option<String>,
    access: AccessLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetOp {
    Read,
    Write,
    Append,
    Search,
    Info,
    Clear,
}

impl SheetOp {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Some(SheetOp::Read),
            "write" => Some(SheetOp::Write),
            "append" => Some(SheetOp::Append),
            "search" => Some(SheetOp::Search),
            "info" => Some(SheetOp::Info),
            "clear" => Some(SheetOp::Clear),
            _ => None,
        }
    }

    fn mutates(&self) -> bool {
        matches!(self, SheetOp::Write | SheetOp::Append | SheetOp::Clear)
    }
}

impl SpreadsheetTool {
    pub fn from_binding(
        client: reqwest::Client,
        binding: &IntegrationBinding,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            spreadsheet_id: binding
                .config_str("spreadsheetId")
                .unwrap_or_default()
                .to_string(),
            token,
            access: binding.access_level(),
        }
    }

    fn token(&self) -> ToolExecResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ToolError::Failed("no spreadsheet credential configured".into()))
    }

    /// `sheetName` (or `sheetIndex` as `Sheet<N+1>`) qualifies the range.
    fn resolve_range(&self, args: &Value) -> String {
        let range = args
            .get("range")
            .and_then(|r| r.as_str())
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RANGE);
        if let Some(name) = args.get("sheetName").and_then(|s| s.as_str()) {
            format!("{name}!{range}")
        } else if let Some(index) = args.get("sheetIndex").and_then(|i| i.as_u64()) {
            format!("Sheet{}!{range}", index + 1)
        } else {
            range.to_string()
        }
    }

    async fn values_get(&self, range: &str) -> ToolExecResult<Value> {
        let url = format!(
            "{SHEETS_BASE}/{}/values/{}",
            self.spreadsheet_id,
            urlencode(range)
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?;
        expect_json(response).await
    }
}

fn urlencode(range: &str) -> String {
    range.replace('!', "%21").replace(':', "%3A").replace(' ', "%20")
}

async fn expect_json(response: reqwest::Response) -> ToolExecResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::Failed(format!(
            "spreadsheet API returned {status}: {body}"
        )));
    }
    Ok(response.json().await?)
}

/// Rows from a values payload that contain the term in any cell.
fn filter_rows(values: &Value, term: &str) -> Vec<Value> {
    let term = term.to_lowercase();
    values
        .get("values")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .filter(|row| {
                    row.as_array().is_some_and(|cells| {
                        cells.iter().any(|c| {
                            c.as_str()
                                .map(|s| s.to_lowercase().contains(&term))
                                .unwrap_or(false)
                        })
                    })
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl Tool for SpreadsheetTool {
    fn name(&self) -> &'static str {
        "manage_spreadsheet"
    }

    fn description(&self) -> &'static str {
        "Read, write, append, search, or clear the spreadsheet bound to this agent"
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
                        "enum": ["read", "write", "append", "search", "info", "clear"],
                    },
                    "range": {"type": "string", "description": "A1-notation range"},
                    "data": {
                        "type": "array",
                        "items": {"type": "array", "items": {"type": "string"}},
                        "description": "2-D array of cell values for write/append",
                    },
                    "searchTerm": {"type": "string"},
                    "sheetName": {"type": "string"},
                    "sheetIndex": {"type": "integer"},
                },
                "required": ["operation"],
            }),
        }
    }

    async fn execute(&self, args: Value) -> ToolExecResult<Value> {
        let op = SheetOp::parse(require_str(&args, "operation")?).ok_or_else(|| {
            ToolError::InvalidArg("operation must be read/write/append/search/info/clear".into())
        })?;
        if op.mutates() && self.access == AccessLevel::ReadOnly {
            return Err(ToolError::ReadOnly);
        }
        if self.spreadsheet_id.is_empty() {
            return Err(ToolError::Failed("no spreadsheet bound to this agent".into()));
        }
        let range = self.resolve_range(&args);
        debug!(op = ?op, %range, "manage_spreadsheet");

        match op {
            SheetOp::Read => self.values_get(&range).await,
            SheetOp::Search => {
                let term = require_str(&args, "searchTerm")?;
                let values = self.values_get(&range).await?;
                Ok(json!({"matches": filter_rows(&values, term)}))
            }
            SheetOp::Info => {
                let url = format!("{SHEETS_BASE}/{}", self.spreadsheet_id);
                let response = self
                    .client
                    .get(&url)
                    .bearer_auth(self.token()?)
                    .query(&[("fields", "properties.title,sheets.properties")])
                    .send()
                    .await?;
                expect_json(response).await
            }
            SheetOp::Write | SheetOp::Append => {
                let data = args
                    .get("data")
                    .and_then(|d| d.as_array())
                    .ok_or(ToolError::MissingArg("data"))?;
                let body = json!({"values": data});
                let response = if op == SheetOp::Write {
                    let url = format!(
                        "{SHEETS_BASE}/{}/values/{}",
                        self.spreadsheet_id,
                        urlencode(&range)
                    );
                    self.client
                        .put(&url)
                        .bearer_auth(self.token()?)
                        .query(&[("valueInputOption", "USER_ENTERED")])
                        .json(&body)
                        .send()
                        .await?
                } else {
                    let url = format!(
                        "{SHEETS_BASE}/{}/values/{}:append",
                        self.spreadsheet_id,
                        urlencode(&range)
                    );
                    self.client
                        .post(&url)
                        .bearer_auth(self.token()?)
                        .query(&[("valueInputOption", "USER_ENTERED")])
                        .json(&body)
                        .send()
                        .await?
                };
                expect_json(response).await
            }
            SheetOp::Clear => {
                let url = format!(
                    "{SHEETS_BASE}/{}/values/{}:clear",
                    self.spreadsheet_id,
                    urlencode(&range)
                );
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(self.token()?)
                    .json(&json!({}))
                    .send()
                    .await?;
                expect_json(response).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::IntegrationKind;

    fn tool(access: &str) -> SpreadsheetTool {
        let binding = IntegrationBinding::new(IntegrationKind::Spreadsheet)
            .with_config("spreadsheetId", "sheet-1")
            .with_config("accessLevel", access);
        SpreadsheetTool::from_binding(reqwest::Client::new(), &binding, Some("tok".into()))
    }

    #[tokio::test]
    async fn read_only_rejects_mutations_before_any_io() {
        let t = tool("read-only");
        for op in ["write", "append", "clear"] {
            let err = t
                .execute(json!({"operation": op, "data": [["x"]]}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::ReadOnly), "op {op}");
        }
    }

    #[tokio::test]
    async fn unknown_operation_is_invalid() {
        let err = tool("read-write")
            .execute(json!({"operation": "merge"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArg(_)));
    }

    #[test]
    fn range_resolution_prefers_sheet_name() {
        let t = tool("read-only");
        assert_eq!(
            t.resolve_range(&json!({"range": "A1:B2", "sheetName": "Q3"})),
            "Q3!A1:B2"
        );
        assert_eq!(
            t.resolve_range(&json!({"sheetIndex": 0})),
            format!("Sheet1!{DEFAULT_RANGE}")
        );
        assert_eq!(t.resolve_range(&json!({})), DEFAULT_RANGE);
    }

    #[test]
    fn search_filters_rows_case_insensitively() {
        let values = json!({"values": [["Alice", "42"], ["Bob", "7"], ["alice b", "9"]]});
        let rows = filter_rows(&values, "ALICE");
        assert_eq!(rows.len(), 2);
    }
}
