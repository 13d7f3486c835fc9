//! Voice session controller: binds audio I/O, the session transport, and the
//! tool dispatcher into one live call.
//!
//! The controller is instantiated per call and is the only writer of
//! `SessionState`. Audio capture and playback run on the platform audio
//! thread and talk to the controller exclusively through channels; `run()`
//! drives everything from one task — the audio handles are not `Send`, so
//! the loop runs where they live. One owner, no locks.

use crate::audio::{AudioCapture, CaptureControl, CaptureFrame};
use crate::error::{VoiceError, VoiceResult};
use crate::pcm;
use crate::playback::{AudioPlayback, PlaybackChunk};
use crate::protocol::{ServerContent, ServerFrame, Setup};
use crate::transport::{SessionTransport, TransportEvent};
use aria_core::{refresh_snapshots, voice_system_instruction, Agent, CoreServices, ToolDispatch};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How often the loop checks whether the playback queue has drained.
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Session lifecycle states. `closed` and `error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Processing,
    Responding,
    Closed,
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Listening => "listening",
            SessionState::Processing => "processing",
            SessionState::Responding => "responding",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Error)
    }
}

/// Error taxonomy surfaced on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    ConfigMissing,
    AudioUnavailable,
    AudioFailed,
    TransportOpenFailed,
    TransportLost,
    ProtocolViolation,
}

impl SessionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionErrorKind::ConfigMissing => "config-missing",
            SessionErrorKind::AudioUnavailable => "audio-unavailable",
            SessionErrorKind::AudioFailed => "audio-failed",
            SessionErrorKind::TransportOpenFailed => "transport-open-failed",
            SessionErrorKind::TransportLost => "transport-lost",
            SessionErrorKind::ProtocolViolation => "protocol-violation",
        }
    }
}

/// Tagged output stream for the UI: state changes, partial text, errors.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    State(SessionState),
    PartialText(String),
    Error(SessionErrorKind),
}

/// Inputs to the state machine. Everything that can move the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateInput {
    Start,
    ToolCallReceived,
    AudioPart,
    TextPart,
    Interrupted,
    TurnDrained,
    Failure,
    Stop,
}

/// The transition table. Terminal states absorb every input.
pub(crate) fn next_state(current: SessionState, input: StateInput) -> SessionState {
    use SessionState::*;
    use StateInput::*;

    if current.is_terminal() {
        return current;
    }
    match input {
        Stop => Closed,
        Failure => Error,
        Start => Listening,
        ToolCallReceived => Processing,
        AudioPart => Responding,
        TextPart => match current {
            // a text-only reply after a tool round puts us back to listening
            Processing => Listening,
            other => other,
        },
        Interrupted | TurnDrained => match current {
            Responding => Listening,
            other => other,
        },
    }
}

/// Clonable stop signal. Safe to fire from any task, any number of times.
#[derive(Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<()>,
}

impl StopHandle {
    pub async fn stop(&self) {
        let _ = self.tx.send(()).await;
    }
}

/// One voice call. Construct, subscribe to events, then `run()`.
pub struct VoiceSessionController {
    services: CoreServices,
    dispatcher: Arc<dyn ToolDispatch>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    stop_tx: mpsc::Sender<()>,
    stop_rx: Option<mpsc::Receiver<()>>,
    control: CaptureControl,
    state: SessionState,
    turn_complete_pending: bool,
}

impl VoiceSessionController {
    pub fn new(services: CoreServices, dispatcher: Arc<dyn ToolDispatch>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::channel(1);
        Self {
            services,
            dispatcher,
            events_tx,
            events_rx: Some(events_rx),
            stop_tx,
            stop_rx: Some(stop_rx),
            control: CaptureControl::new(),
            state: SessionState::Idle,
            turn_complete_pending: false,
        }
    }

    /// The single output stream. Can be taken once.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Mute only suppresses outbound audio; the state machine is untouched.
    pub fn set_muted(&self, muted: bool) {
        self.control.mute.store(muted, Ordering::Relaxed);
    }

    /// Capture frames dropped because the transport was not writable.
    pub fn dropped_frames(&self) -> u64 {
        self.control.dropped.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, input: StateInput) {
        let next = next_state(self.state, input);
        if next != self.state {
            debug!(from = self.state.as_str(), to = next.as_str(), "state");
            self.state = next;
            let _ = self.events_tx.send(SessionEvent::State(next));
        }
    }

    fn fail(&mut self, kind: SessionErrorKind) {
        let _ = self.events_tx.send(SessionEvent::Error(kind));
        self.transition(StateInput::Failure);
    }

    /// Drive one live call to completion. Returns when the session reaches
    /// `closed` (clean) or `error` (the kind has already been emitted).
    pub async fn run(&mut self, agent: &Agent) -> VoiceResult<()> {
        if self.services.config.api_key.trim().is_empty() {
            self.fail(SessionErrorKind::ConfigMissing);
            return Err(VoiceError::Config("MODEL_API_KEY is not set".into()));
        }

        info!("📞 starting voice session for agent '{}'", agent.name);
        refresh_snapshots(agent, &self.services.snapshots, &self.services.http).await;
        let snapshots = self.services.snapshots.for_agent(agent);
        let instruction = voice_system_instruction(agent, &snapshots);
        let setup = Setup::new(
            self.services.config.model_id.clone(),
            agent.voice,
            Some(instruction),
            self.dispatcher.declarations(),
        );

        let capture = match AudioCapture::new() {
            Ok(c) => c,
            Err(e) => {
                self.fail(SessionErrorKind::AudioUnavailable);
                return Err(e);
            }
        };
        let playback = match AudioPlayback::new() {
            Ok(p) => p,
            Err(e) => {
                self.fail(SessionErrorKind::AudioUnavailable);
                return Err(e);
            }
        };

        let (frame_tx, mut frame_rx) = mpsc::channel::<CaptureFrame>(16);
        let (capture_err_tx, mut capture_err_rx) = mpsc::unbounded_channel::<String>();
        let stream = match capture.start_capture(frame_tx, capture_err_tx, self.control.clone()) {
            Ok(s) => s,
            Err(e) => {
                self.fail(SessionErrorKind::AudioUnavailable);
                return Err(e);
            }
        };

        let (mut transport, mut transport_rx) = match SessionTransport::connect(
            self.services.config.live_endpoint.clone(),
            self.services.config.api_key.clone(),
            setup,
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                self.fail(SessionErrorKind::TransportOpenFailed);
                return Err(e);
            }
        };

        self.transition(StateInput::Start);

        let mut drain_tick = tokio::time::interval(DRAIN_POLL);
        let mut tool_tasks: Vec<tokio::task::JoinHandle<()>> = Vec::new();
        let mut stop_rx = self.stop_rx.take();

        let result = loop {
            tokio::select! {
                biased;

                _ = recv_stop(&mut stop_rx) => {
                    info!("stop requested");
                    break Ok(());
                }

                Some(err) = capture_err_rx.recv() => {
                    self.fail(SessionErrorKind::AudioFailed);
                    break Err(VoiceError::AudioFailed(err));
                }

                Some(frame) = frame_rx.recv() => {
                    if !transport.send_audio_frame(&frame) {
                        self.control.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }

                event = transport_rx.recv() => match event {
                    Some(TransportEvent::Frame(frame)) => {
                        self.handle_frame(frame, &playback, &transport, &mut tool_tasks);
                    }
                    Some(TransportEvent::Reconnected) => {
                        info!("transport restored");
                    }
                    Some(TransportEvent::Closed) | None => {
                        info!("transport closed");
                        break Ok(());
                    }
                    Some(TransportEvent::Lost) => {
                        self.fail(SessionErrorKind::TransportLost);
                        break Err(VoiceError::TransportLost("reconnects exhausted".into()));
                    }
                    Some(TransportEvent::ProtocolFailure) => {
                        self.fail(SessionErrorKind::ProtocolViolation);
                        break Err(VoiceError::Protocol("repeated malformed frames".into()));
                    }
                },

                _ = drain_tick.tick() => {
                    if self.turn_complete_pending
                        && self.state == SessionState::Responding
                        && !playback.is_active()
                    {
                        self.turn_complete_pending = false;
                        self.transition(StateInput::TurnDrained);
                    }
                }
            }
        };

        // teardown: abandon in-flight tools, silence playback, stop capture,
        // close the channel cleanly
        for task in tool_tasks {
            task.abort();
        }
        playback.interrupt();
        drop(stream);
        transport.close().await;
        if !self.state.is_terminal() {
            self.transition(StateInput::Stop);
        }
        let dropped = self.dropped_frames();
        if dropped > 0 {
            debug!(dropped, "capture frames dropped during session");
        }
        info!("session ended: {}", self.state.as_str());
        result
    }

    fn handle_frame(
        &mut self,
        frame: ServerFrame,
        playback: &AudioPlayback,
        transport: &SessionTransport,
        tool_tasks: &mut Vec<tokio::task::JoinHandle<()>>,
    ) {
        if let Some(tool_call) = frame.tool_call {
            if !tool_call.function_calls.is_empty() {
                self.transition(StateInput::ToolCallReceived);
                let dispatcher = Arc::clone(&self.dispatcher);
                let responder = transport.responder();
                let calls = tool_call.function_calls;
                info!(count = calls.len(), "dispatching tool calls");
                tool_tasks.push(tokio::spawn(async move {
                    let results = dispatcher.dispatch_all(calls).await;
                    // a stopped session closes the channel; results are
                    // discarded, which is exactly the abandon semantics
                    if responder.send(results).await.is_err() {
                        debug!("tool results discarded: session gone");
                    }
                }));
            }
        }

        if let Some(content) = frame.server_content {
            self.handle_server_content(content, playback);
        }
    }

    fn handle_server_content(&mut self, content: ServerContent, playback: &AudioPlayback) {
        if content.interrupted {
            playback.interrupt();
            self.turn_complete_pending = false;
            self.transition(StateInput::Interrupted);
        }

        if let Some(turn) = content.model_turn {
            // parts are processed in declared order so interleaved text and
            // audio reconstruct faithfully
            for part in turn.parts {
                if let Some(text) = part.text {
                    let _ = self.events_tx.send(SessionEvent::PartialText(text));
                    self.transition(StateInput::TextPart);
                }
                if let Some(inline) = part.inline_data {
                    match pcm::from_base64(&inline.data) {
                        Ok(samples) => {
                            playback.enqueue(PlaybackChunk {
                                pcm: samples,
                                seq: playback.next_seq(),
                            });
                            self.transition(StateInput::AudioPart);
                        }
                        Err(e) => warn!("undecodable audio part skipped: {e}"),
                    }
                }
            }
        }

        if content.generation_complete {
            debug!("generation complete");
        }
        if content.turn_complete {
            self.turn_complete_pending = true;
        }
    }
}

/// Await the stop signal; pends forever when the receiver is gone so the
/// other select arms keep the loop alive.
async fn recv_stop(stop_rx: &mut Option<mpsc::Receiver<()>>) {
    match stop_rx {
        Some(rx) => {
            if rx.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}
