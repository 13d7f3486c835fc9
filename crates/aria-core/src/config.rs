//! Environment-driven configuration.
//!
//! The core refuses to start without `MODEL_API_KEY`; both endpoints default
//! to the hosted model family.

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_MODEL_ID: &str = "models/gemini-2.0-flash-exp";
pub const DEFAULT_LIVE_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";
pub const DEFAULT_TEXT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Model access configuration shared by the voice and text paths.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Bearer/key credential. Required.
    pub api_key: String,
    /// Bidirectional streaming endpoint (ws).
    pub live_endpoint: String,
    /// Single-shot completion endpoint (https).
    pub text_endpoint: String,
    /// Model name placed in the setup frame.
    pub model_id: String,
}

impl CoreConfig {
    /// Build from `MODEL_API_KEY`, `MODEL_ENDPOINT`, `MODEL_TEXT_ENDPOINT`,
    /// `MODEL_ID`. Only the key is required.
    pub fn from_env() -> CoreResult<Self> {
        let api_key = std::env::var("MODEL_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CoreError::ConfigMissing("MODEL_API_KEY is not set".into()))?;

        let live_endpoint = std::env::var("MODEL_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_LIVE_ENDPOINT.to_string());
        let text_endpoint = std::env::var("MODEL_TEXT_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_TEXT_ENDPOINT.to_string());
        let model_id =
            std::env::var("MODEL_ID").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

        Ok(Self {
            api_key,
            live_endpoint,
            text_endpoint,
            model_id,
        })
    }

    /// Explicit construction for tests and non-env wiring.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            live_endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
            text_endpoint: DEFAULT_TEXT_ENDPOINT.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}
