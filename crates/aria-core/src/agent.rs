//! Agent model: persona, voice, integration bindings, and knowledge documents.
//!
//! Agents are created and mutated by the persistence collaborator (see
//! [`crate::store::AgentStore`]); the core only reads them for the duration
//! of a conversation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prebuilt voice for the streaming model's speech output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceId {
    #[default]
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
    Leda,
    Orus,
    Zephyr,
}

impl VoiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceId::Puck => "Puck",
            VoiceId::Charon => "Charon",
            VoiceId::Kore => "Kore",
            VoiceId::Fenrir => "Fenrir",
            VoiceId::Aoede => "Aoede",
            VoiceId::Leda => "Leda",
            VoiceId::Orus => "Orus",
            VoiceId::Zephyr => "Zephyr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "puck" => Some(VoiceId::Puck),
            "charon" => Some(VoiceId::Charon),
            "kore" => Some(VoiceId::Kore),
            "fenrir" => Some(VoiceId::Fenrir),
            "aoede" => Some(VoiceId::Aoede),
            "leda" => Some(VoiceId::Leda),
            "orus" => Some(VoiceId::Orus),
            "zephyr" => Some(VoiceId::Zephyr),
            _ => None,
        }
    }
}

/// Closed set of integration kinds an agent can bind.
///
/// Action kinds become callable tools declared to the model at session open;
/// source kinds are fetched into [`crate::snapshot::IntegrationSnapshot`]s
/// and injected into the context instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationKind {
    HttpRequest,
    DomainCheck,
    WebhookTrigger,
    Spreadsheet,
    NotesWorkspace,
    NewsFeed,
    Rss,
    MarketData,
    NotesWorkspaceSource,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::HttpRequest => "http-request",
            IntegrationKind::DomainCheck => "domain-check",
            IntegrationKind::WebhookTrigger => "webhook-trigger",
            IntegrationKind::Spreadsheet => "spreadsheet",
            IntegrationKind::NotesWorkspace => "notes-workspace",
            IntegrationKind::NewsFeed => "news-feed",
            IntegrationKind::Rss => "rss",
            IntegrationKind::MarketData => "market-data",
            IntegrationKind::NotesWorkspaceSource => "notes-workspace-source",
        }
    }

    /// Passive kinds: fetched at chat-start, never declared as tools.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            IntegrationKind::NewsFeed
                | IntegrationKind::Rss
                | IntegrationKind::MarketData
                | IntegrationKind::NotesWorkspaceSource
        )
    }

    /// Action kinds: declared to the model as callable tools.
    pub fn is_action(&self) -> bool {
        !self.is_source()
    }
}

/// When a binding's data is refreshed or its tool is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerPolicy {
    #[default]
    ChatStart,
    Interval,
    Both,
    OnDemand,
}

impl TriggerPolicy {
    pub fn fires_on_chat_start(&self) -> bool {
        matches!(self, TriggerPolicy::ChatStart | TriggerPolicy::Both)
    }
}

/// Access level for integrations that can mutate remote data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    #[default]
    ReadOnly,
    ReadWrite,
}

/// One integration bound to one agent with a kind-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationBinding {
    pub kind: IntegrationKind,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub trigger: TriggerPolicy,
}

fn default_enabled() -> bool {
    true
}

impl IntegrationBinding {
    pub fn new(kind: IntegrationKind) -> Self {
        Self {
            kind,
            config: Map::new(),
            enabled: true,
            trigger: TriggerPolicy::default(),
        }
    }

    pub fn with_config(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    /// Recognized string config key, trimmed; None when absent or empty.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn access_level(&self) -> AccessLevel {
        match self.config_str("accessLevel") {
            Some(s) if s.eq_ignore_ascii_case("read-write") => AccessLevel::ReadWrite,
            _ => AccessLevel::ReadOnly,
        }
    }
}

/// An uploaded knowledge document. Extraction happens upstream; the core
/// only ever sees the already-extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub text: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A user-defined conversational persona plus its bound tools and documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub voice: VoiceId,
    #[serde(default)]
    pub bindings: Vec<IntegrationBinding>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            persona: String::new(),
            instructions: String::new(),
            voice: VoiceId::default(),
            bindings: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn enabled_bindings(&self) -> impl Iterator<Item = &IntegrationBinding> {
        self.bindings.iter().filter(|b| b.enabled)
    }

    /// Enabled action bindings: the tool set declared at session open.
    pub fn tool_bindings(&self) -> Vec<&IntegrationBinding> {
        self.enabled_bindings().filter(|b| b.kind.is_action()).collect()
    }

    /// Enabled passive source bindings, refreshed into snapshots.
    pub fn source_bindings(&self) -> Vec<&IntegrationBinding> {
        self.enabled_bindings().filter(|b| b.kind.is_source()).collect()
    }
}
