//! # Aria Voice — Realtime Voice Agent Bridge
//!
//! Mediates between a microphone/speaker pair, a bidirectional streaming
//! model endpoint, and the tool dispatcher, with sub-100 ms turn-taking,
//! barge-in, and backpressure.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Voice Session Controller                     │
//! │  ┌────────────┐   ┌───────────────┐   ┌─────────────────┐    │
//! │  │  Capture   │ → │   Transport   │ → │ Tool Dispatcher │    │
//! │  │ 16kHz PCM16│   │  (ws frames)  │   │  (tool-calls)   │    │
//! │  └────────────┘   └───────┬───────┘   └─────────────────┘    │
//! │        ↑                  ↓ 24kHz PCM16                      │
//! │  ┌────────────┐   ┌───────────────┐                          │
//! │  │    Mic     │   │   Playback    │ ← interrupted flag       │
//! │  │  (cpal)    │   │   (rodio)     │   clears the queue       │
//! │  └────────────┘   └───────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Capture is gated by a simple amplitude threshold; real turn detection is
//! the remote VAD (100 ms silence cutoff, configured in the setup frame).

pub mod audio;
pub mod controller;
pub mod error;
pub mod pcm;
pub mod playback;
pub mod protocol;
pub mod transport;

pub use audio::{
    AudioCapture, CaptureControl, CaptureFrame, CAPTURE_SAMPLE_RATE, FRAME_SAMPLES,
    GATE_THRESHOLD,
};
pub use controller::{
    SessionErrorKind, SessionEvent, SessionState, StopHandle, VoiceSessionController,
};
pub use error::{VoiceError, VoiceResult};
pub use playback::{AudioPlayback, PlaybackChunk, PlaybackQueue, PLAYBACK_SAMPLE_RATE};
pub use protocol::{ClientFrame, ServerFrame, Setup};
pub use transport::{
    backoff_delay, SessionTransport, ToolResponder, TransportEvent, MAX_RECONNECT_ATTEMPTS,
    OPEN_TIMEOUT, RECONNECT_CAP,
};
