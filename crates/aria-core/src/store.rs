//! Persistence collaborator interface.
//!
//! Agent CRUD and OAuth credential storage live outside the core; this trait
//! is the full surface the core consumes. `MemoryStore` backs the gateway,
//! examples, and tests.

use crate::agent::Agent;
use crate::error::{CoreError, CoreResult};
use dashmap::DashMap;

/// CRUD + credential collaborator. Implemented elsewhere for real storage.
#[async_trait::async_trait]
pub trait AgentStore: Send + Sync {
    async fn list_agents(&self, user_id: &str) -> CoreResult<Vec<Agent>>;
    async fn save_agent(&self, user_id: &str, agent: Agent) -> CoreResult<Agent>;
    async fn delete_agent(&self, user_id: &str, agent_id: &str) -> CoreResult<()>;
    /// Bearer token for a third-party provider (e.g. "sheets", "notes").
    async fn get_oauth_credential(&self, user_id: &str, provider: &str) -> CoreResult<String>;
}

/// In-process store keyed by (user, agent id). No persistence across restarts.
#[derive(Default)]
pub struct MemoryStore {
    agents: DashMap<(String, String), Agent>,
    credentials: DashMap<(String, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_credential(&self, user_id: &str, provider: &str, token: impl Into<String>) {
        self.credentials
            .insert((user_id.to_string(), provider.to_string()), token.into());
    }
}

#[async_trait::async_trait]
impl AgentStore for MemoryStore {
    async fn list_agents(&self, user_id: &str) -> CoreResult<Vec<Agent>> {
        let mut agents: Vec<Agent> = self
            .agents
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().clone())
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn save_agent(&self, user_id: &str, agent: Agent) -> CoreResult<Agent> {
        if agent.id.trim().is_empty() {
            return Err(CoreError::Store("agent id must not be empty".into()));
        }
        self.agents
            .insert((user_id.to_string(), agent.id.clone()), agent.clone());
        Ok(agent)
    }

    async fn delete_agent(&self, user_id: &str, agent_id: &str) -> CoreResult<()> {
        self.agents
            .remove(&(user_id.to_string(), agent_id.to_string()));
        Ok(())
    }

    async fn get_oauth_credential(&self, user_id: &str, provider: &str) -> CoreResult<String> {
        self.credentials
            .get(&(user_id.to_string(), provider.to_string()))
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                CoreError::Store(format!("no credential for provider '{provider}'"))
            })
    }
}
