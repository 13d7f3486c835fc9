//! Speaker playback using Rodio.
//!
//! Accepts 24 kHz mono PCM16 chunks, plays them in sequence order with no
//! inter-chunk gap, and supports immediate barge-in preemption: `interrupt()`
//! stops the current source and clears everything queued.

use crate::error::{VoiceError, VoiceResult};
use crate::pcm;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Playback format is fixed: 24 kHz mono PCM16.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;
pub const PLAYBACK_CHANNELS: u16 = 1;

/// One received audio chunk, tagged with its arrival sequence number.
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    pub pcm: Vec<i16>,
    pub seq: u64,
}

/// Ordered chunk queue. Chunks play in sequence-number order; the queue
/// never reorders.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    chunks: VecDeque<PlaybackChunk>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push preserves arrival order; an out-of-order sequence number is a
    /// caller bug and is logged, never reordered.
    pub fn push(&mut self, chunk: PlaybackChunk) {
        if let Some(last) = self.chunks.back() {
            if chunk.seq < last.seq {
                warn!(
                    incoming = chunk.seq,
                    last = last.seq,
                    "playback chunk arrived out of order"
                );
            }
        }
        self.chunks.push_back(chunk);
    }

    pub fn pop(&mut self) -> Option<PlaybackChunk> {
        self.chunks.pop_front()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Speaker output. The rodio sink gives gapless advance between appended
/// chunks; `interrupt()` is the barge-in kill-switch.
pub struct AudioPlayback {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
    next_seq: AtomicU64,
    enqueued: AtomicU64,
}

impl AudioPlayback {
    pub fn new() -> VoiceResult<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| VoiceError::AudioUnavailable(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| VoiceError::AudioUnavailable(e.to_string()))?;
        info!("🔊 playback ready ({PLAYBACK_SAMPLE_RATE} Hz)");
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
            next_seq: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
        })
    }

    /// Assign the next sequence number for an arriving chunk.
    pub fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue one PCM16 chunk. When the sink is idle this starts playing
    /// immediately; otherwise it follows the previous chunk with no gap. A
    /// bad chunk logs and is skipped — playback advances.
    pub fn enqueue(&self, chunk: PlaybackChunk) {
        if chunk.pcm.is_empty() {
            debug!(seq = chunk.seq, "skipping empty playback chunk");
            return;
        }
        let samples = pcm::decode(&chunk.pcm);
        let source = SamplesBuffer::new(PLAYBACK_CHANNELS, PLAYBACK_SAMPLE_RATE, samples);
        self.sink.append(source);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether anything is playing or queued.
    pub fn is_active(&self) -> bool {
        !self.sink.empty()
    }

    /// Barge-in: stop the current source and clear the queue immediately.
    pub fn interrupt(&self) {
        self.sink.stop();
        info!("⏹️ playback interrupted, queue cleared");
    }

    /// Chunks accepted since the session opened.
    pub fn chunks_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(seq: u64) -> PlaybackChunk {
        PlaybackChunk {
            pcm: vec![0i16; 8],
            seq,
        }
    }

    #[test]
    fn queue_preserves_fifo_order() {
        let mut q = PlaybackQueue::new();
        for seq in [0, 1, 2, 3] {
            q.push(chunk(seq));
        }
        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|c| c.seq).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut q = PlaybackQueue::new();
        q.push(chunk(0));
        q.push(chunk(1));
        assert_eq!(q.len(), 2);
        q.clear();
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }

    #[test]
    fn out_of_order_push_is_kept_fifo() {
        // the queue warns but never reorders; arrival order wins
        let mut q = PlaybackQueue::new();
        q.push(chunk(5));
        q.push(chunk(3));
        assert_eq!(q.pop().unwrap().seq, 5);
        assert_eq!(q.pop().unwrap().seq, 3);
    }
}
