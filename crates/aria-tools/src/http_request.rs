//! `make_api_request` — issue a single HTTP request on the user's behalf.

use crate::{require_str, Tool, ToolError, ToolExecResult};
use aria_core::FunctionDeclaration;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_method(args: &Value) -> ToolExecResult<Method> {
    let name = args
        .get("method")
        .and_then(|v| v.as_str())
        .unwrap_or("GET");
    match name.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => Err(ToolError::InvalidArg(format!(
            "method must be GET/POST/PUT/DELETE, got '{other}'"
        ))),
    }
}

#[async_trait::async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &'static str {
        "make_api_request"
    }

    fn description(&self) -> &'static str {
        "Issue a single HTTP request to a URL and return the response body"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().into(),
            description: self.description().into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Absolute URL to request"},
                    "method": {"type": "string", "enum": ["GET", "POST", "PUT", "DELETE"]},
                    "headers": {"type": "object", "description": "Header name/value mapping"},
                    "body": {"type": "string", "description": "Raw request body"},
                },
                "required": ["url"],
            }),
        }
    }

    async fn execute(&self, args: Value) -> ToolExecResult<Value> {
        let url = require_str(&args, "url")?;
        let method = parse_method(&args)?;
        debug!(%url, %method, "make_api_request");

        let mut request = self.client.request(method.clone(), url);
        if let Some(headers) = args.get("headers").and_then(|h| h.as_object()) {
            for (name, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(name, v);
                }
            }
        }
        if let Some(body) = args.get("body").and_then(|b| b.as_str()) {
            request = request.body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        // Structured bodies come back as JSON so the model can pick fields.
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        Ok(json!({
            "status": status,
            "body": data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_defaults_to_get() {
        assert_eq!(parse_method(&json!({})).unwrap(), Method::GET);
        assert_eq!(
            parse_method(&json!({"method": "post"})).unwrap(),
            Method::POST
        );
        assert!(parse_method(&json!({"method": "PATCH"})).is_err());
    }

    #[tokio::test]
    async fn missing_url_is_rejected() {
        let tool = HttpRequestTool::new(reqwest::Client::new());
        let err = tool.execute(json!({"method": "GET"})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingArg("url")));
    }
}
