//! Wire protocol for the bidirectional model channel.
//!
//! Four client envelope kinds (`setup`, `realtimeInput`, `toolResponse`) and
//! the server frames (`setupComplete`, `serverContent`, `toolCall`) are the
//! whole contract. Frames are JSON text messages; audio rides base64-encoded
//! PCM16 inside them.

use crate::error::{VoiceError, VoiceResult};
use aria_core::{FunctionDeclaration, ToolCall, ToolResponseItem, VoiceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AUDIO_INPUT_MIME: &str = "audio/pcm;rate=16000";

/// VAD hints sent in the setup frame: snappy turn-taking over caution.
pub const VAD_PREFIX_PADDING_MS: u32 = 10;
pub const VAD_SILENCE_DURATION_MS: u32 = 100;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Setup {
        setup: Setup,
    },
    RealtimeInput {
        #[serde(rename = "realtimeInput")]
        realtime_input: RealtimeInput,
    },
    ToolResponse {
        #[serde(rename = "toolResponse")]
        tool_response: ToolResponsePayload,
    },
}

impl ClientFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// One capture frame as a realtime-input envelope.
    pub fn audio_chunk(base64_pcm: String) -> Self {
        ClientFrame::RealtimeInput {
            realtime_input: RealtimeInput {
                media_chunks: vec![MediaChunk {
                    mime_type: AUDIO_INPUT_MIME.to_string(),
                    data: base64_pcm,
                }],
            },
        }
    }

    pub fn tool_response(items: Vec<ToolResponseItem>) -> Self {
        ClientFrame::ToolResponse {
            tool_response: ToolResponsePayload {
                function_responses: items,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,
    pub realtime_input_config: RealtimeInputConfig,
}

impl Setup {
    pub fn new(
        model: impl Into<String>,
        voice: VoiceId,
        system_instruction: Option<String>,
        declarations: Vec<FunctionDeclaration>,
    ) -> Self {
        let tools = if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: declarations,
            }]
        };
        Self {
            model: model.into(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.as_str().to_string(),
                        },
                    },
                },
            },
            system_instruction: system_instruction.map(|text| Content {
                parts: vec![TextPart { text }],
            }),
            tools,
            realtime_input_config: RealtimeInputConfig {
                automatic_activity_detection: AutomaticActivityDetection {
                    prefix_padding_ms: VAD_PREFIX_PADDING_MS,
                    silence_duration_ms: VAD_SILENCE_DURATION_MS,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputConfig {
    pub automatic_activity_detection: AutomaticActivityDetection,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticActivityDetection {
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponsePayload {
    pub function_responses: Vec<ToolResponseItem>,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// One inbound frame. Any combination of the three sections may be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFrame {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCallFrame>,
}

impl ServerFrame {
    /// Parse a text frame. A malformed frame is a protocol violation — the
    /// caller logs and drops it.
    pub fn parse(text: &str) -> VoiceResult<Self> {
        serde_json::from_str(text).map_err(|e| VoiceError::Protocol(e.to_string()))
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub generation_complete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One ordered part of a model turn: text, inline audio, or (tolerated)
/// something newer we don't know about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallFrame {
    #[serde(default)]
    pub function_calls: Vec<ToolCall>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CAPTURE_SAMPLE_RATE;
    use serde_json::json;

    #[test]
    fn setup_frame_shape() {
        let setup = Setup::new("models/test-model", VoiceId::Puck, Some("Be brief.".into()), vec![]);
        let frame = ClientFrame::Setup { setup };
        let v: Value = serde_json::from_str(&frame.to_json()).unwrap();

        assert_eq!(v["setup"]["model"], "models/test-model");
        assert_eq!(
            v["setup"]["generationConfig"]["responseModalities"],
            json!(["AUDIO"])
        );
        assert_eq!(
            v["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert_eq!(
            v["setup"]["systemInstruction"]["parts"][0]["text"],
            "Be brief."
        );
        let vad = &v["setup"]["realtimeInputConfig"]["automaticActivityDetection"];
        assert_eq!(vad["prefixPaddingMs"], 10);
        assert_eq!(vad["silenceDurationMs"], 100);
        // no tools bound: the key is omitted entirely
        assert!(v["setup"].get("tools").is_none());
    }

    #[test]
    fn setup_frame_carries_declarations() {
        let decl = FunctionDeclaration {
            name: "make_api_request".into(),
            description: "http".into(),
            parameters: json!({"type": "object"}),
        };
        let setup = Setup::new("m", VoiceId::Kore, None, vec![decl]);
        let v: Value = serde_json::to_value(ClientFrame::Setup { setup }).unwrap();
        assert_eq!(
            v["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "make_api_request"
        );
    }

    #[test]
    fn audio_chunk_frame_shape() {
        let frame = ClientFrame::audio_chunk("QUJD".into());
        let v: Value = serde_json::to_value(&frame).unwrap();
        let chunk = &v["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], AUDIO_INPUT_MIME);
        assert_eq!(chunk["data"], "QUJD");
        // mime rate and capture rate must agree
        assert!(AUDIO_INPUT_MIME.ends_with(&CAPTURE_SAMPLE_RATE.to_string()));
    }

    #[test]
    fn tool_response_frame_preserves_ids() {
        use aria_core::ToolOutcome;
        let frame = ClientFrame::tool_response(vec![ToolResponseItem {
            id: "t1".into(),
            name: "make_api_request".into(),
            response: ToolOutcome::ok(json!({"status": 200})),
        }]);
        let v: Value = serde_json::to_value(&frame).unwrap();
        let item = &v["toolResponse"]["functionResponses"][0];
        assert_eq!(item["id"], "t1");
        assert_eq!(item["response"]["success"], json!(true));
    }

    #[test]
    fn server_content_parses_interleaved_parts_in_order() {
        let text = r#"{
            "serverContent": {
                "modelTurn": {"parts": [
                    {"text": "Sure — "},
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}},
                    {"text": "done."}
                ]},
                "turnComplete": true
            }
        }"#;
        let frame = ServerFrame::parse(text).unwrap();
        let content = frame.server_content.unwrap();
        assert!(content.turn_complete);
        assert!(!content.interrupted);
        let parts = content.model_turn.unwrap().parts;
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].text.as_deref(), Some("Sure — "));
        assert!(parts[1].inline_data.is_some());
        assert_eq!(parts[2].text.as_deref(), Some("done."));
    }

    #[test]
    fn tool_call_frame_parses() {
        let text = r#"{"toolCall": {"functionCalls": [
            {"id": "t1", "name": "make_api_request", "args": {"url": "https://example.test/ping", "method": "GET"}}
        ]}}"#;
        let frame = ServerFrame::parse(text).unwrap();
        let calls = frame.tool_call.unwrap().function_calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "t1");
        assert_eq!(calls[0].args["url"], "https://example.test/ping");
    }

    #[test]
    fn setup_complete_flag() {
        assert!(ServerFrame::parse(r#"{"setupComplete": {}}"#)
            .unwrap()
            .is_setup_complete());
        assert!(!ServerFrame::parse(r#"{"serverContent": {}}"#)
            .unwrap()
            .is_setup_complete());
    }

    #[test]
    fn malformed_frame_is_a_protocol_error() {
        assert!(matches!(
            ServerFrame::parse("not json"),
            Err(VoiceError::Protocol(_))
        ));
    }
}
