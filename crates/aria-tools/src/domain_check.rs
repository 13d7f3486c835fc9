//! `check_domain_availability` — sweep a base name across TLD variations
//! via public RDAP, with a WHOIS re-check for `.io`.
//!
//! RDAP 404 means unregistered, 2xx means taken. The `.io` registry's RDAP
//! coverage is unreliable enough that a 404 there is re-verified against a
//! secondary WHOIS lookup before we call the name free.

use crate::{require_str, Tool, ToolExecResult};
use aria_core::FunctionDeclaration;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const RDAP_BASE: &str = "https://rdap.org/domain";
const WHOIS_FALLBACK: &str = "https://api.whois.vu/?q=";

const DEFAULT_VARIATIONS: [&str; 5] = [
    "{domain}.com",
    "{domain}.net",
    "{domain}.org",
    "{domain}.io",
    "{domain}.ai",
];

/// Candidates checked at once; RDAP endpoints rate-limit aggressively.
const BATCH_SIZE: usize = 5;
const BATCH_PAUSE: Duration = Duration::from_millis(100);

pub struct DomainCheckTool {
    client: reqwest::Client,
    rdap_base: String,
    whois_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RdapVerdict {
    Available,
    Taken,
    Error,
}

fn classify_rdap(status: u16) -> RdapVerdict {
    match status {
        404 => RdapVerdict::Available,
        200..=299 => RdapVerdict::Taken,
        _ => RdapVerdict::Error,
    }
}

/// Expand `{domain}` across the variation patterns. A pattern without the
/// placeholder is kept verbatim (it already names a full domain).
fn expand_variations(domain: &str, variations: &[String]) -> Vec<String> {
    variations
        .iter()
        .map(|pattern| pattern.replace("{domain}", domain))
        .collect()
}

impl DomainCheckTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            rdap_base: RDAP_BASE.to_string(),
            whois_base: WHOIS_FALLBACK.to_string(),
        }
    }

    /// Point at substitute endpoints. The verdict semantics are the
    /// contract; the endpoints are drop-in replaceable.
    pub fn with_endpoints(
        mut self,
        rdap_base: impl Into<String>,
        whois_base: impl Into<String>,
    ) -> Self {
        self.rdap_base = rdap_base.into();
        self.whois_base = whois_base.into();
        self
    }

    async fn check_one(&self, candidate: &str) -> Value {
        let url = format!("{}/{candidate}", self.rdap_base);
        let status = match self.client.get(&url).send().await {
            Ok(r) => r.status().as_u16(),
            Err(e) => {
                return json!({
                    "domain": candidate,
                    "available": Value::Null,
                    "method": "rdap.org",
                    "error": e.to_string(),
                })
            }
        };
        debug!(%candidate, status, "rdap lookup");

        match classify_rdap(status) {
            RdapVerdict::Taken => json!({
                "domain": candidate,
                "available": false,
                "method": "rdap.org",
            }),
            RdapVerdict::Error => json!({
                "domain": candidate,
                "available": Value::Null,
                "method": "rdap.org",
                "error": format!("unexpected status {status}"),
            }),
            RdapVerdict::Available => {
                if candidate.ends_with(".io") {
                    self.verify_io(candidate).await
                } else {
                    json!({
                        "domain": candidate,
                        "available": true,
                        "method": "rdap.org",
                    })
                }
            }
        }
    }

    /// RDAP said 404 for a `.io` name: ask WHOIS before trusting it.
    async fn verify_io(&self, candidate: &str) -> Value {
        let url = format!("{}{candidate}", self.whois_base);
        let has_record = match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => {
                let body: Value = r.json().await.unwrap_or(Value::Null);
                whois_has_record(&body)
            }
            _ => false,
        };
        if has_record {
            json!({
                "domain": candidate,
                "available": false,
                "method": "whois fallback",
            })
        } else {
            json!({
                "domain": candidate,
                "available": true,
                "method": "rdap.org (uncertain for .io)",
            })
        }
    }
}

/// A WHOIS answer naming any server record means the domain exists.
fn whois_has_record(body: &Value) -> bool {
    body.get("whois")
        .and_then(|w| w.as_str())
        .map(|w| !w.trim().is_empty())
        .unwrap_or(false)
        || body
            .get("status")
            .and_then(|s| s.as_str())
            .map(|s| s.eq_ignore_ascii_case("taken"))
            .unwrap_or(false)
}

#[async_trait::async_trait]
impl Tool for DomainCheckTool {
    fn name(&self) -> &'static str {
        "check_domain_availability"
    }

    fn description(&self) -> &'static str {
        "Check a base name against a set of domain variations via public RDAP"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().into(),
            description: self.description().into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "domain": {"type": "string", "description": "Base name without a TLD"},
                    "variations": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Patterns using the {domain} placeholder, e.g. \"{domain}.io\"",
                    },
                },
                "required": ["domain"],
            }),
        }
    }

    async fn execute(&self, args: Value) -> ToolExecResult<Value> {
        let domain = require_str(&args, "domain")?.to_lowercase();
        let variations: Vec<String> = args
            .get("variations")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VARIATIONS.iter().map(|s| s.to_string()).collect());

        let candidates = expand_variations(&domain, &variations);
        let mut results = Vec::with_capacity(candidates.len());
        for (i, batch) in candidates.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
            let batch_results =
                futures::future::join_all(batch.iter().map(|c| self.check_one(c))).await;
            results.extend(batch_results);
        }

        Ok(json!({
            "domain": domain,
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn rdap_status_classification() {
        assert_eq!(classify_rdap(404), RdapVerdict::Available);
        assert_eq!(classify_rdap(200), RdapVerdict::Taken);
        assert_eq!(classify_rdap(204), RdapVerdict::Taken);
        assert_eq!(classify_rdap(429), RdapVerdict::Error);
        assert_eq!(classify_rdap(500), RdapVerdict::Error);
    }

    #[test]
    fn variation_expansion() {
        let patterns = vec!["{domain}.io".to_string(), "get{domain}.com".to_string()];
        assert_eq!(
            expand_variations("foo", &patterns),
            vec!["foo.io", "getfoo.com"]
        );
    }

    #[test]
    fn default_variations_cover_five_tlds() {
        let patterns: Vec<String> = DEFAULT_VARIATIONS.iter().map(|s| s.to_string()).collect();
        let expanded = expand_variations("foo", &patterns);
        assert_eq!(expanded.len(), 5);
        assert!(expanded.contains(&"foo.com".to_string()));
        assert!(expanded.contains(&"foo.io".to_string()));
    }

    #[test]
    fn whois_record_detection() {
        assert!(whois_has_record(
            &json!({"whois": "Domain Name: FOO.IO\nRegistrar: X"})
        ));
        assert!(whois_has_record(&json!({"status": "taken"})));
        assert!(!whois_has_record(&json!({"whois": "  "})));
        assert!(!whois_has_record(&json!({})));
    }

    /// Minimal one-request-per-connection HTTP stub.
    async fn serve_fixed(listener: TcpListener, status_line: &'static str, body: &'static str) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    }

    #[tokio::test]
    async fn io_rdap_miss_with_whois_record_is_taken() {
        let rdap = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let whois = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rdap_addr = rdap.local_addr().unwrap();
        let whois_addr = whois.local_addr().unwrap();
        tokio::spawn(serve_fixed(rdap, "404 Not Found", "{}"));
        tokio::spawn(serve_fixed(
            whois,
            "200 OK",
            r#"{"whois": "Domain Name: FOO.IO"}"#,
        ));

        let tool = DomainCheckTool::new(reqwest::Client::new()).with_endpoints(
            format!("http://{rdap_addr}"),
            format!("http://{whois_addr}/?q="),
        );
        let out = tool
            .execute(json!({"domain": "foo", "variations": ["{domain}.io"]}))
            .await
            .unwrap();
        let result = &out["results"][0];
        assert_eq!(result["domain"], "foo.io");
        assert_eq!(result["available"], json!(false));
        assert_eq!(result["method"], "whois fallback");
    }

    #[tokio::test]
    async fn io_rdap_miss_without_whois_record_is_uncertainly_available() {
        let rdap = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let whois = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rdap_addr = rdap.local_addr().unwrap();
        let whois_addr = whois.local_addr().unwrap();
        tokio::spawn(serve_fixed(rdap, "404 Not Found", "{}"));
        tokio::spawn(serve_fixed(whois, "200 OK", r#"{"whois": ""}"#));

        let tool = DomainCheckTool::new(reqwest::Client::new()).with_endpoints(
            format!("http://{rdap_addr}"),
            format!("http://{whois_addr}/?q="),
        );
        let out = tool
            .execute(json!({"domain": "foo", "variations": ["{domain}.io"]}))
            .await
            .unwrap();
        let result = &out["results"][0];
        assert_eq!(result["available"], json!(true));
        assert_eq!(result["method"], "rdap.org (uncertain for .io)");
    }

    #[tokio::test]
    async fn non_io_rdap_miss_is_available_without_fallback() {
        let rdap = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rdap_addr = rdap.local_addr().unwrap();
        tokio::spawn(serve_fixed(rdap, "404 Not Found", "{}"));

        let tool = DomainCheckTool::new(reqwest::Client::new()).with_endpoints(
            format!("http://{rdap_addr}"),
            // whois endpoint must never be hit for .com
            "http://127.0.0.1:1/?q=",
        );
        let out = tool
            .execute(json!({"domain": "foo", "variations": ["{domain}.com"]}))
            .await
            .unwrap();
        let result = &out["results"][0];
        assert_eq!(result["available"], json!(true));
        assert_eq!(result["method"], "rdap.org");
    }
}
