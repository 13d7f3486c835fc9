//! Source-integration snapshots.
//!
//! Passive bindings (news feeds, RSS, market data, notes workspace) are
//! fetched at chat-start and cached in memory keyed by (agent id, kind).
//! A fetch failure leaves the previous snapshot in place; staleness is
//! visible through the timestamp, never an error.

use crate::agent::{Agent, IntegrationBinding, IntegrationKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ITEMS: usize = 5;

/// Cached result of the most recent successful fetch for one source binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSnapshot {
    pub agent_id: String,
    pub kind: IntegrationKind,
    pub fetched_at: DateTime<Utc>,
    pub summary: String,
}

/// In-memory snapshot cache. Writes happen only during chat-start refresh;
/// readers observe either the previous or the new snapshot atomically.
#[derive(Default)]
pub struct SnapshotCache {
    entries: DashMap<(String, IntegrationKind), IntegrationSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, agent_id: &str, kind: IntegrationKind) -> Option<IntegrationSnapshot> {
        self.entries
            .get(&(agent_id.to_string(), kind))
            .map(|e| e.value().clone())
    }

    pub fn insert(&self, snapshot: IntegrationSnapshot) {
        self.entries
            .insert((snapshot.agent_id.clone(), snapshot.kind), snapshot);
    }

    /// All snapshots for one agent, in a stable kind order.
    pub fn for_agent(&self, agent: &Agent) -> Vec<IntegrationSnapshot> {
        agent
            .source_bindings()
            .iter()
            .filter_map(|b| self.get(&agent.id, b.kind))
            .collect()
    }
}

/// Refresh every enabled source binding whose trigger policy includes
/// chat-start. Failures are logged and skipped.
pub async fn refresh_snapshots(agent: &Agent, cache: &SnapshotCache, client: &reqwest::Client) {
    for binding in agent.source_bindings() {
        if !binding.trigger.fires_on_chat_start() {
            continue;
        }
        match fetch_source(binding, client).await {
            Ok(summary) => {
                debug!(kind = binding.kind.as_str(), "source snapshot refreshed");
                cache.insert(IntegrationSnapshot {
                    agent_id: agent.id.clone(),
                    kind: binding.kind,
                    fetched_at: Utc::now(),
                    summary,
                });
            }
            Err(e) => {
                warn!(kind = binding.kind.as_str(), "source fetch failed: {e}");
            }
        }
    }
}

async fn fetch_source(
    binding: &IntegrationBinding,
    client: &reqwest::Client,
) -> Result<String, String> {
    match binding.kind {
        IntegrationKind::NewsFeed | IntegrationKind::Rss => {
            let url = binding
                .config_str("url")
                .ok_or_else(|| "missing 'url' in source config".to_string())?;
            let body = client
                .get(url)
                .timeout(FETCH_TIMEOUT)
                .send()
                .await
                .map_err(|e| e.to_string())?
                .text()
                .await
                .map_err(|e| e.to_string())?;
            let titles = extract_titles(&body, MAX_ITEMS);
            if titles.is_empty() {
                Err("no items found in feed".into())
            } else {
                Ok(titles.join("; "))
            }
        }
        IntegrationKind::MarketData => {
            let url = binding
                .config_str("url")
                .ok_or_else(|| "missing 'url' in source config".to_string())?;
            let value: serde_json::Value = client
                .get(url)
                .timeout(FETCH_TIMEOUT)
                .send()
                .await
                .map_err(|e| e.to_string())?
                .json()
                .await
                .map_err(|e| e.to_string())?;
            Ok(summarize_json(&value, MAX_ITEMS))
        }
        IntegrationKind::NotesWorkspaceSource => {
            let token = binding
                .config_str("token")
                .ok_or_else(|| "missing 'token' in source config".to_string())?;
            let value: serde_json::Value = client
                .post("https://api.notion.com/v1/search")
                .bearer_auth(token)
                .header("Notion-Version", "2022-06-28")
                .timeout(FETCH_TIMEOUT)
                .json(&serde_json::json!({
                    "sort": {"direction": "descending", "timestamp": "last_edited_time"},
                    "page_size": MAX_ITEMS,
                }))
                .send()
                .await
                .map_err(|e| e.to_string())?
                .json()
                .await
                .map_err(|e| e.to_string())?;
            let titles = notes_titles(&value);
            if titles.is_empty() {
                Err("workspace search returned no pages".into())
            } else {
                Ok(titles.join("; "))
            }
        }
        other => Err(format!("'{}' is not a source kind", other.as_str())),
    }
}

/// Pull up to `n` `<title>` values out of a feed body. Feeds are summarized
/// for context injection, not parsed; the channel title is skipped when an
/// item-level title follows it.
fn extract_titles(body: &str, n: usize) -> Vec<String> {
    let mut titles = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("<title") {
        let after = &rest[start..];
        let Some(open_end) = after.find('>') else { break };
        let after = &after[open_end + 1..];
        let Some(close) = after.find("</title>") else { break };
        let raw = after[..close].trim();
        let clean = raw
            .trim_start_matches("<![CDATA[")
            .trim_end_matches("]]>")
            .trim();
        if !clean.is_empty() {
            titles.push(clean.to_string());
        }
        rest = &after[close + "</title>".len()..];
    }
    if titles.len() > 1 {
        titles.remove(0);
    }
    titles.truncate(n);
    titles
}

/// One-line digest of a JSON payload's top-level scalar fields.
fn summarize_json(value: &serde_json::Value, n: usize) -> String {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(_, v)| v.is_number() || v.is_string() || v.is_boolean())
            .take(n)
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{k}={s}"),
                None => format!("{k}={v}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => {
            let mut s = other.to_string();
            if s.len() > 200 {
                s.truncate(200);
            }
            s
        }
    }
}

fn notes_titles(value: &serde_json::Value) -> Vec<String> {
    let Some(results) = value.get("results").and_then(|r| r.as_array()) else {
        return Vec::new();
    };
    results
        .iter()
        .filter_map(|page| {
            page.get("properties")?
                .as_object()?
                .values()
                .find_map(|prop| prop.get("title"))
                .and_then(|t| t.as_array())
                .and_then(|parts| parts.first())
                .and_then(|p| p.get("plain_text"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TriggerPolicy;

    #[test]
    fn extract_titles_skips_channel_title() {
        let feed = "<rss><channel><title>Feed Name</title>\
                    <item><title>First story</title></item>\
                    <item><title><![CDATA[Second story]]></title></item>\
                    </channel></rss>";
        let titles = extract_titles(feed, 5);
        assert_eq!(titles, vec!["First story", "Second story"]);
    }

    #[test]
    fn extract_titles_caps_item_count() {
        let feed: String = (0..10)
            .map(|i| format!("<title>t{i}</title>"))
            .collect();
        assert_eq!(extract_titles(&feed, 3).len(), 3);
    }

    #[test]
    fn summarize_json_takes_scalar_fields() {
        let v = serde_json::json!({"price": 42.5, "symbol": "ACME", "nested": {"x": 1}});
        let s = summarize_json(&v, 5);
        assert!(s.contains("price=42.5"));
        assert!(s.contains("symbol=ACME"));
        assert!(!s.contains("nested"));
    }

    #[test]
    fn cache_replaces_atomically_per_key() {
        let cache = SnapshotCache::new();
        let snap = |summary: &str| IntegrationSnapshot {
            agent_id: "a1".into(),
            kind: IntegrationKind::NewsFeed,
            fetched_at: Utc::now(),
            summary: summary.into(),
        };
        cache.insert(snap("old"));
        cache.insert(snap("new"));
        assert_eq!(
            cache.get("a1", IntegrationKind::NewsFeed).unwrap().summary,
            "new"
        );
        assert!(cache.get("a1", IntegrationKind::Rss).is_none());
    }

    #[tokio::test]
    async fn refresh_skips_non_chat_start_triggers() {
        let mut agent = Agent::new("a1", "Nova");
        let mut binding = IntegrationBinding::new(IntegrationKind::NewsFeed)
            .with_config("url", "http://127.0.0.1:1/feed");
        binding.trigger = TriggerPolicy::OnDemand;
        agent.bindings.push(binding);

        let cache = SnapshotCache::new();
        refresh_snapshots(&agent, &cache, &reqwest::Client::new()).await;
        assert!(cache.get("a1", IntegrationKind::NewsFeed).is_none());
    }
}
