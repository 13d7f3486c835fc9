//! Aria gateway — agent CRUD and the text chat path over HTTP.
//!
//! The voice path needs local audio hardware and lives in
//! `aria-voice/examples/voice_call.rs`; this surface serves everything else:
//! agent management against the in-process store and `POST /api/v1/chat`
//! running one text exchange per request (transcripts are kept per
//! user/agent pair for the life of the process).

use aria_core::{
    Agent, AgentStore, CoreConfig, CoreServices, MemoryStore, TextSession, Transcript,
};
use aria_tools::{ToolCredentials, ToolDispatcher};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct AppState {
    services: CoreServices,
    store: MemoryStore,
    transcripts: DashMap<(String, String), Transcript>,
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(default = "default_user")]
    user: String,
}

fn default_user() -> String {
    "local".to_string()
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default = "default_user")]
    user: String,
    agent_id: String,
    message: String,
}

enum ApiError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    let state = Arc::new(AppState {
        services: CoreServices::new(config),
        store: MemoryStore::new(),
        transcripts: DashMap::new(),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/agents", get(list_agents).post(save_agent))
        .route("/api/v1/agents/:id", delete(delete_agent))
        .route("/api/v1/chat", post(chat))
        .with_state(state);

    let addr: SocketAddr = std::env::var("ARIA_GATEWAY_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8600".into())
        .parse()?;
    info!("aria gateway listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn list_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    state
        .store
        .list_agents(&query.user)
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn save_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    Json(agent): Json<Agent>,
) -> Result<Json<Agent>, ApiError> {
    state
        .store
        .save_agent(&query.user, agent)
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete_agent(&query.user, &id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agents = state
        .store
        .list_agents(&request.user)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let agent = agents
        .into_iter()
        .find(|a| a.id == request.agent_id)
        .ok_or_else(|| ApiError::NotFound(format!("no agent '{}'", request.agent_id)))?;

    let credentials = ToolCredentials {
        spreadsheet: state
            .store
            .get_oauth_credential(&request.user, "spreadsheet")
            .await
            .ok(),
        notes: state
            .store
            .get_oauth_credential(&request.user, "notes")
            .await
            .ok(),
    };
    let dispatcher =
        ToolDispatcher::for_agent(&agent, state.services.http.clone(), credentials);

    let key = (request.user.clone(), agent.id.clone());
    let transcript = state
        .transcripts
        .remove(&key)
        .map(|(_, t)| t)
        .unwrap_or_default();

    let mut session = TextSession::new(
        &agent,
        &state.services.config,
        &dispatcher,
        &state.services.snapshots,
        state.services.http.clone(),
    )
    .with_transcript(transcript);

    let reply = session.send(&request.message).await.map_err(|e| {
        error!("chat failed: {e}");
        ApiError::Internal(e.to_string())
    })?;
    state.transcripts.insert(key, session.into_transcript());

    Ok(Json(serde_json::json!({"reply": reply})))
}
