//! Microphone capture using CPAL.
//!
//! Captures mono float32 at 16 kHz in 512-sample frames (~32 ms), gates
//! silence with a simple amplitude threshold, converts passing frames to
//! PCM16, and delivers them one message per frame. Delivery never blocks the
//! audio callback: a full channel drops the frame and bumps a counter.

use crate::error::{VoiceError, VoiceResult};
use crate::pcm;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Capture format is fixed: 16 kHz mono PCM16 in 512-sample frames. Anything
/// else reaching the transport is a bug, not a runtime condition.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
pub const CAPTURE_CHANNELS: u16 = 1;
pub const FRAME_SAMPLES: usize = 512;

/// Minimum absolute amplitude for a frame to pass the silence gate.
pub const GATE_THRESHOLD: f32 = 0.002;

/// One captured frame, already converted to PCM16.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub pcm: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Monotonic per-session sequence number (gated frames still advance it,
    /// so a dropped frame is never re-ordered before a newer one).
    pub seq: u64,
}

/// A frame passes the gate when any sample exceeds the threshold.
pub fn frame_passes_gate(samples: &[f32]) -> bool {
    samples.iter().any(|x| x.abs() > GATE_THRESHOLD)
}

/// Shared capture-side switches owned by the controller.
#[derive(Clone)]
pub struct CaptureControl {
    /// Mute suppresses delivery without touching the state machine.
    pub mute: Arc<AtomicBool>,
    /// Frames dropped because the transport side was not writable.
    pub dropped: Arc<AtomicU64>,
}

impl CaptureControl {
    pub fn new() -> Self {
        Self {
            mute: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for CaptureControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Microphone capture. Construction acquires the input device; a missing
/// device or denied permission is `audio-unavailable`.
pub struct AudioCapture {
    device: Device,
    stream_config: StreamConfig,
}

impl AudioCapture {
    pub fn new() -> VoiceResult<Self> {
        let device = cpal::default_host().default_input_device().ok_or_else(|| {
            VoiceError::AudioUnavailable("no input device available".to_string())
        })?;
        info!(
            "🎤 capture device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let stream_config = StreamConfig {
            channels: CAPTURE_CHANNELS,
            sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Fixed(FRAME_SAMPLES as u32),
        };
        Ok(Self {
            device,
            stream_config,
        })
    }

    /// Start capturing. Frames are delivered on `frame_tx` (best-effort);
    /// runtime stream errors are reported on `error_tx` and end the session
    /// as `audio-failed`. Keep the returned stream alive; dropping it stops
    /// capture while the device stays acquired for reuse.
    pub fn start_capture(
        &self,
        frame_tx: mpsc::Sender<CaptureFrame>,
        error_tx: mpsc::UnboundedSender<String>,
        control: CaptureControl,
    ) -> VoiceResult<Stream> {
        let mut buffer: Vec<f32> = Vec::with_capacity(FRAME_SAMPLES);
        let mut seq: u64 = 0;

        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    buffer.push(sample);
                    if buffer.len() < FRAME_SAMPLES {
                        continue;
                    }
                    let frame_seq = seq;
                    seq += 1;
                    let muted = control.mute.load(Ordering::Relaxed);
                    if !muted && frame_passes_gate(&buffer) {
                        let frame = CaptureFrame {
                            pcm: pcm::encode(&buffer),
                            sample_rate: CAPTURE_SAMPLE_RATE,
                            channels: CAPTURE_CHANNELS,
                            seq: frame_seq,
                        };
                        if frame_tx.try_send(frame).is_err() {
                            control.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    buffer.clear();
                }
            },
            move |err| {
                warn!("capture stream error: {err}");
                let _ = error_tx.send(err.to_string());
            },
            None,
        )?;

        stream.play()?;
        info!("▶️ audio capture started ({CAPTURE_SAMPLE_RATE} Hz, {FRAME_SAMPLES}-sample frames)");
        Ok(stream)
    }
}
