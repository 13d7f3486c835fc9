//! Transport-level integration tests against a scripted local server.
//!
//! These cover the wire contract without audio hardware: the setup
//! handshake, tool-call round-trips with call-id preservation, the
//! interrupted flag, reconnect after an unclean close, and clean shutdown.

use aria_core::{FunctionDeclaration, ToolDispatch, VoiceId};
use aria_tools::{Tool, ToolDispatcher, ToolExecResult};
use aria_voice::{ServerFrame, SessionTransport, Setup, TransportEvent};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

struct PingTool;

#[async_trait::async_trait]
impl Tool for PingTool {
    fn name(&self) -> &'static str {
        "make_api_request"
    }
    fn description(&self) -> &'static str {
        "stub http tool"
    }
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "make_api_request".into(),
            description: "stub http tool".into(),
            parameters: json!({"type": "object"}),
        }
    }
    async fn execute(&self, args: Value) -> ToolExecResult<Value> {
        Ok(json!({"echo": args}))
    }
}

async fn accept_and_handshake(listener: &TcpListener) -> (WebSocketStream<TcpStream>, Value) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let setup_msg = ws.next().await.unwrap().unwrap();
    let setup: Value = serde_json::from_str(setup_msg.to_text().unwrap()).unwrap();
    ws.send(Message::Text(json!({"setupComplete": {}}).to_string()))
        .await
        .unwrap();
    (ws, setup)
}

fn test_setup() -> Setup {
    Setup::new(
        "models/test-model",
        VoiceId::Puck,
        Some("You are Nova, a concise assistant.".into()),
        vec![PingTool.declaration()],
    )
}

#[tokio::test]
async fn handshake_tool_round_trip_and_interrupt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut ws, setup) = accept_and_handshake(&listener).await;

        // the setup frame names the model, voice, and declared tools
        assert_eq!(setup["setup"]["model"], "models/test-model");
        assert_eq!(
            setup["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]
                ["prebuiltVoiceConfig"]["voiceName"],
            "Puck"
        );
        assert_eq!(
            setup["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "make_api_request"
        );

        ws.send(Message::Text(
            json!({"toolCall": {"functionCalls": [
                {"id": "t1", "name": "make_api_request",
                 "args": {"url": "https://example.test/ping", "method": "GET"}}
            ]}})
            .to_string(),
        ))
        .await
        .unwrap();

        // the client must answer with the same call id
        let reply = ws.next().await.unwrap().unwrap();
        let reply: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        let item = &reply["toolResponse"]["functionResponses"][0];
        assert_eq!(item["id"], "t1");
        assert_eq!(item["name"], "make_api_request");
        assert_eq!(item["response"]["success"], json!(true));

        ws.send(Message::Text(
            json!({"serverContent": {"interrupted": true}}).to_string(),
        ))
        .await
        .unwrap();

        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }))
        .await
        .unwrap();
    });

    let (transport, mut events) =
        SessionTransport::connect(format!("ws://{addr}"), "", test_setup())
            .await
            .unwrap();

    // tool-call frame arrives, gets dispatched, response goes back in-band
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(std::sync::Arc::new(PingTool));

    let frame = match events.recv().await.unwrap() {
        TransportEvent::Frame(f) => f,
        other => panic!("expected tool-call frame, got {other:?}"),
    };
    let calls = frame.tool_call.unwrap().function_calls;
    assert_eq!(calls[0].id, "t1");
    let results = dispatcher.dispatch_all(calls).await;
    transport.send_tool_response(results).await.unwrap();

    let frame = match events.recv().await.unwrap() {
        TransportEvent::Frame(f) => f,
        other => panic!("expected server content, got {other:?}"),
    };
    assert!(frame.server_content.unwrap().interrupted);

    // normal close code: clean end, no reconnect
    match events.recv().await.unwrap() {
        TransportEvent::Closed => {}
        other => panic!("expected clean close, got {other:?}"),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn unclean_close_reconnects_and_resends_setup() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // first connection dies with a non-normal code
        let (mut ws, _) = accept_and_handshake(&listener).await;
        ws.send(Message::Text(
            json!({"serverContent": {"modelTurn": {"parts": [{"text": "hi"}]}}}).to_string(),
        ))
        .await
        .unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: "flap".into(),
        }))
        .await
        .unwrap();

        // reconnect arrives with a fresh setup handshake
        let (mut ws, setup) = accept_and_handshake(&listener).await;
        assert_eq!(setup["setup"]["model"], "models/test-model");
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }))
        .await
        .unwrap();
    });

    let (_transport, mut events) =
        SessionTransport::connect(format!("ws://{addr}"), "", test_setup())
            .await
            .unwrap();

    match events.recv().await.unwrap() {
        TransportEvent::Frame(f) => {
            let parts = f.server_content.unwrap().model_turn.unwrap().parts;
            assert_eq!(parts[0].text.as_deref(), Some("hi"));
        }
        other => panic!("expected frame, got {other:?}"),
    }

    // first backoff is 1 s; the reconnect shows up as an event
    match events.recv().await.unwrap() {
        TransportEvent::Reconnected => {}
        other => panic!("expected reconnect, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        TransportEvent::Closed => {}
        other => panic!("expected clean close, got {other:?}"),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_teardown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut ws, _) = accept_and_handshake(&listener).await;
        // a lone malformed frame is logged and dropped
        ws.send(Message::Text("{not json".to_string())).await.unwrap();
        ws.send(Message::Text(
            json!({"serverContent": {"turnComplete": true}}).to_string(),
        ))
        .await
        .unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }))
        .await
        .unwrap();
    });

    let (_transport, mut events) =
        SessionTransport::connect(format!("ws://{addr}"), "", test_setup())
            .await
            .unwrap();

    // the session survives: next event is the valid frame, not a failure
    match events.recv().await.unwrap() {
        TransportEvent::Frame(f) => assert!(f.server_content.unwrap().turn_complete),
        other => panic!("expected valid frame after violation, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        TransportEvent::Closed => {}
        other => panic!("expected clean close, got {other:?}"),
    }

    server.await.unwrap();
}

#[test]
fn wire_frame_parse_matches_contract() {
    let frame = ServerFrame::parse(r#"{"setupComplete": {}}"#).unwrap();
    assert!(frame.is_setup_complete());
}
