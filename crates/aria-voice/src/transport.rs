//! Session transport: the bidirectional framed connection to the model.
//!
//! Owns the websocket, translates between envelopes and wire frames, and
//! surfaces inbound frames in arrival order. Outbound audio is best-effort —
//! a frame that cannot be written right now is dropped, because voice
//! latency beats completeness and the remote VAD re-synchronizes. Unclean
//! closes reconnect with exponential backoff (1 s, 2 s, 4 s, capped at
//! 10 s), at most 3 attempts per session.

use crate::audio::CaptureFrame;
use crate::error::{VoiceError, VoiceResult};
use crate::pcm;
use crate::protocol::{ClientFrame, ServerFrame, Setup};
use aria_core::ToolResponseItem;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub const OPEN_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
pub const RECONNECT_CAP: Duration = Duration::from_secs(10);

/// Outbound queue depth. Audio frames beyond this are dropped, not buffered.
const OUTBOUND_CAPACITY: usize = 32;

const VIOLATION_LIMIT: usize = 5;
const VIOLATION_WINDOW: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Backoff before reconnect attempt `attempt` (0-based): 1 s, 2 s, 4 s, …
/// capped at 10 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 1u64 << attempt.min(16);
    Duration::from_secs(secs).min(RECONNECT_CAP)
}

/// Sliding-window counter for malformed frames. A single violation is
/// logged and dropped; more than 5 within 10 s tears the session down.
#[derive(Debug, Default)]
struct ViolationWindow {
    times: VecDeque<Instant>,
}

impl ViolationWindow {
    fn record(&mut self, now: Instant) -> bool {
        self.times.push_back(now);
        while let Some(front) = self.times.front() {
            if now.duration_since(*front) > VIOLATION_WINDOW {
                self.times.pop_front();
            } else {
                break;
            }
        }
        self.times.len() > VIOLATION_LIMIT
    }
}

/// Asynchronous transport events, delivered in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// Handshake completed after a reconnect.
    Reconnected,
    /// One inbound server frame.
    Frame(ServerFrame),
    /// Clean close (normal code or client-initiated). No reconnect.
    Closed,
    /// Unclean close with all reconnect attempts exhausted.
    Lost,
    /// Repeated protocol violations; session torn down.
    ProtocolFailure,
}

/// Connection settings the I/O task needs to (re)open the channel.
#[derive(Clone)]
struct ConnectSpec {
    endpoint: String,
    api_key: String,
    setup: Setup,
}

impl ConnectSpec {
    fn url(&self) -> String {
        if self.api_key.is_empty() {
            return self.endpoint.clone();
        }
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, sep, self.api_key)
    }
}

/// Dial, send the setup frame, and wait for `setupComplete` — all inside
/// the open deadline.
async fn open_session(spec: &ConnectSpec) -> VoiceResult<WsStream> {
    let handshake = async {
        let (mut ws, _) = connect_async(spec.url()).await?;
        ws.send(Message::Text(
            ClientFrame::Setup {
                setup: spec.setup.clone(),
            }
            .to_json(),
        ))
        .await?;
        while let Some(msg) = ws.next().await {
            match msg? {
                Message::Text(text) => {
                    let frame = ServerFrame::parse(&text)?;
                    if frame.is_setup_complete() {
                        debug!("setup complete");
                        return Ok(ws);
                    }
                    // pre-handshake noise is dropped
                }
                Message::Close(_) => {
                    return Err(VoiceError::TransportOpenFailed(
                        "peer closed during handshake".into(),
                    ))
                }
                _ => {}
            }
        }
        Err(VoiceError::TransportOpenFailed(
            "connection ended during handshake".into(),
        ))
    };

    match tokio::time::timeout(OPEN_TIMEOUT, handshake).await {
        Ok(result) => result,
        Err(_) => Err(VoiceError::TransportOpenFailed(format!(
            "handshake did not complete within {}s",
            OPEN_TIMEOUT.as_secs()
        ))),
    }
}

/// One live transport per voice session controller.
pub struct SessionTransport {
    outbound: mpsc::Sender<ClientFrame>,
    shutdown: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl SessionTransport {
    /// Open the channel and complete the setup handshake. Returns the
    /// transport handle and the inbound event stream.
    pub async fn connect(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        setup: Setup,
    ) -> VoiceResult<(Self, mpsc::UnboundedReceiver<TransportEvent>)> {
        let spec = ConnectSpec {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            setup,
        };
        let ws = match open_session(&spec).await {
            Ok(ws) => ws,
            Err(VoiceError::TransportOpenFailed(e)) => {
                return Err(VoiceError::TransportOpenFailed(e))
            }
            Err(e) => return Err(VoiceError::TransportOpenFailed(e.to_string())),
        };
        info!("transport open: {}", spec.endpoint);

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(run_io(ws, spec, outbound_rx, events_tx, shutdown_rx));
        Ok((
            Self {
                outbound: outbound_tx,
                shutdown: shutdown_tx,
                task: Some(task),
            },
            events_rx,
        ))
    }

    /// Best-effort audio send: one message per capture frame. Returns false
    /// when the channel was not writable and the frame was dropped.
    pub fn send_audio_frame(&self, frame: &CaptureFrame) -> bool {
        let envelope = ClientFrame::audio_chunk(pcm::to_base64(&frame.pcm));
        self.outbound.try_send(envelope).is_ok()
    }

    /// Reliable send for tool responses.
    pub async fn send_tool_response(&self, items: Vec<ToolResponseItem>) -> VoiceResult<()> {
        self.responder().send(items).await
    }

    /// Clonable reliable-send handle, usable from spawned dispatch tasks.
    /// Sends fail once the session is gone; callers discard results then.
    pub fn responder(&self) -> ToolResponder {
        ToolResponder {
            outbound: self.outbound.clone(),
        }
    }

    /// Client-initiated clean close. Idempotent.
    pub async fn close(&mut self) {
        let _ = self.shutdown.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Reliable tool-response sender detached from the transport handle.
#[derive(Clone)]
pub struct ToolResponder {
    outbound: mpsc::Sender<ClientFrame>,
}

impl ToolResponder {
    pub async fn send(&self, items: Vec<ToolResponseItem>) -> VoiceResult<()> {
        self.outbound
            .send(ClientFrame::tool_response(items))
            .await
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }
}

async fn run_io(
    mut ws: WsStream,
    spec: ConnectSpec,
    mut outbound_rx: mpsc::Receiver<ClientFrame>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut violations = ViolationWindow::default();

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                let _ = ws.close(None).await;
                let _ = events_tx.send(TransportEvent::Closed);
                return;
            }

            out = outbound_rx.recv() => match out {
                Some(frame) => {
                    if let Err(e) = ws.send(Message::Text(frame.to_json())).await {
                        warn!("outbound send failed: {e}");
                        match reconnect(&spec, &events_tx).await {
                            Some(new_ws) => ws = new_ws,
                            None => return,
                        }
                    }
                }
                // controller dropped the handle: treat as client close
                None => {
                    let _ = ws.close(None).await;
                    let _ = events_tx.send(TransportEvent::Closed);
                    return;
                }
            },

            inbound = ws.next() => match inbound {
                Some(Ok(Message::Text(text))) => match ServerFrame::parse(&text) {
                    Ok(frame) => {
                        let _ = events_tx.send(TransportEvent::Frame(frame));
                    }
                    Err(e) => {
                        warn!("malformed frame dropped: {e}");
                        if violations.record(Instant::now()) {
                            let _ = events_tx.send(TransportEvent::ProtocolFailure);
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                },
                Some(Ok(Message::Close(close_frame))) => {
                    let clean = close_frame
                        .as_ref()
                        .map(|c| matches!(c.code, CloseCode::Normal | CloseCode::Away))
                        .unwrap_or(false);
                    if clean {
                        info!("peer closed cleanly");
                        let _ = events_tx.send(TransportEvent::Closed);
                        return;
                    }
                    warn!("unclean close: {close_frame:?}");
                    match reconnect(&spec, &events_tx).await {
                        Some(new_ws) => ws = new_ws,
                        None => return,
                    }
                }
                Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                Some(Err(e)) => {
                    warn!("transport read error: {e}");
                    match reconnect(&spec, &events_tx).await {
                        Some(new_ws) => ws = new_ws,
                        None => return,
                    }
                }
                None => {
                    warn!("connection dropped without close frame");
                    match reconnect(&spec, &events_tx).await {
                        Some(new_ws) => ws = new_ws,
                        None => return,
                    }
                }
            },
        }
    }
}

/// Reconnect with backoff; `None` means attempts are exhausted and the
/// `Lost` event has been emitted.
async fn reconnect(
    spec: &ConnectSpec,
    events_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<WsStream> {
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        let delay = backoff_delay(attempt);
        info!(
            attempt = attempt + 1,
            delay_s = delay.as_secs(),
            "reconnecting"
        );
        tokio::time::sleep(delay).await;
        match open_session(spec).await {
            Ok(ws) => {
                info!("reconnected");
                let _ = events_tx.send(TransportEvent::Reconnected);
                return Some(ws);
            }
            Err(e) => warn!("reconnect attempt {} failed: {e}", attempt + 1),
        }
    }
    let _ = events_tx.send(TransportEvent::Lost);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_exponential_then_capped() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(4), Duration::from_secs(10));
        assert_eq!(backoff_delay(60), Duration::from_secs(10));
    }

    #[test]
    fn backoff_is_non_decreasing() {
        let mut last = Duration::ZERO;
        for attempt in 0..10 {
            let d = backoff_delay(attempt);
            assert!(d >= last);
            last = d;
        }
    }

    #[test]
    fn violation_window_tolerates_up_to_limit() {
        let mut w = ViolationWindow::default();
        let now = Instant::now();
        for _ in 0..VIOLATION_LIMIT {
            assert!(!w.record(now));
        }
        assert!(w.record(now));
    }

    #[test]
    fn violation_window_forgets_old_entries() {
        let mut w = ViolationWindow::default();
        let old = Instant::now();
        for _ in 0..VIOLATION_LIMIT {
            assert!(!w.record(old));
        }
        // same count again, but past the window: tolerated
        let later = old + VIOLATION_WINDOW + Duration::from_secs(1);
        assert!(!w.record(later));
    }

    #[test]
    fn connect_spec_appends_key_correctly() {
        let spec = ConnectSpec {
            endpoint: "wss://model.test/ws".into(),
            api_key: "k1".into(),
            setup: Setup::new("m", aria_core::VoiceId::Puck, None, vec![]),
        };
        assert_eq!(spec.url(), "wss://model.test/ws?key=k1");

        let with_query = ConnectSpec {
            endpoint: "wss://model.test/ws?alt=json".into(),
            api_key: "k1".into(),
            setup: Setup::new("m", aria_core::VoiceId::Puck, None, vec![]),
        };
        assert_eq!(with_query.url(), "wss://model.test/ws?alt=json&key=k1");
    }
}
