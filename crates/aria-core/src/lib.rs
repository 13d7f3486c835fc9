//! # Aria Core
//!
//! Shared foundation for the Aria conversational workspace: the agent model
//! (persona, voice, integration bindings, knowledge documents), deterministic
//! context assembly, the source-integration snapshot cache, the persistence
//! collaborator interface, and the text conversation path.
//!
//! The voice path lives in `aria-voice`; tool implementations live in
//! `aria-tools` and plug in through the [`ToolDispatch`] seam defined here.

mod agent;
mod chat;
mod config;
mod context;
mod error;
mod snapshot;
mod store;
mod tooling;
mod transcript;

pub use agent::{
    AccessLevel, Agent, Document, IntegrationBinding, IntegrationKind, TriggerPolicy, VoiceId,
};
pub use chat::TextSession;
pub use config::{CoreConfig, DEFAULT_LIVE_ENDPOINT, DEFAULT_MODEL_ID, DEFAULT_TEXT_ENDPOINT};
pub use context::{text_prompt, voice_system_instruction};
pub use error::{CoreError, CoreResult};
pub use snapshot::{refresh_snapshots, IntegrationSnapshot, SnapshotCache};
pub use store::{AgentStore, MemoryStore};
pub use tooling::{FunctionDeclaration, ToolCall, ToolDispatch, ToolOutcome, ToolResponseItem};
pub use transcript::{ConversationTurn, Role, Transcript};

use std::sync::Arc;

/// Per-process services handed to each session: the snapshot cache and a
/// shared HTTP client. Sessions are instantiated per call; nothing here is a
/// global.
#[derive(Clone)]
pub struct CoreServices {
    pub config: Arc<CoreConfig>,
    pub snapshots: Arc<SnapshotCache>,
    pub http: reqwest::Client,
}

impl CoreServices {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            snapshots: Arc::new(SnapshotCache::new()),
            http: reqwest::Client::new(),
        }
    }
}
