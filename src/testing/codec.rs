//! Stand-in encoder and decoder
//!
//! [`SyntheticEncoder`] queues frames and only emits chunks when told to,
//! which lets tests hold the in-flight queue at any depth.
//! [`RecordingDecoder`] checks every chunk the way a real decoder would
//! fail (delta without a reference, damaged payload) and records what it
//! accepted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use super::synthetic_data::{is_synthetic_payload, synthetic_payload};
use crate::codec::{CapturedFrame, EncodedChunk, FrameType, VideoDecoder, VideoEncoder};
use crate::errors::StreamError;

pub const DEFAULT_KEY_CHUNK_SIZE: usize = 4_000;
pub const DEFAULT_DELTA_CHUNK_SIZE: usize = 800;

pub struct SyntheticEncoder {
    output: mpsc::UnboundedSender<EncodedChunk>,
    pending: VecDeque<(u32, bool)>,
    key_chunk_size: usize,
    delta_chunk_size: usize,
    width: u32,
    height: u32,
    emitted: u64,
}

impl SyntheticEncoder {
    pub fn new(output: mpsc::UnboundedSender<EncodedChunk>) -> Self {
        Self {
            output,
            pending: VecDeque::new(),
            key_chunk_size: DEFAULT_KEY_CHUNK_SIZE,
            delta_chunk_size: DEFAULT_DELTA_CHUNK_SIZE,
            width: 0,
            height: 0,
            emitted: 0,
        }
    }

    /// Encoder plus the stream its chunks come out of
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EncodedChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn with_chunk_sizes(mut self, key: usize, delta: usize) -> Self {
        self.key_chunk_size = key;
        self.delta_chunk_size = delta;
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Finish the oldest queued frame. Returns false when nothing is queued
    /// or the output stream is gone.
    pub fn emit_next(&mut self) -> bool {
        let Some(&(timestamp, key_frame)) = self.pending.front() else {
            return false;
        };
        let size = if key_frame {
            self.key_chunk_size
        } else {
            self.delta_chunk_size
        };
        let chunk = EncodedChunk::new(
            synthetic_payload(timestamp, size),
            FrameType::from_key_flag(key_frame),
            timestamp,
        );
        if self.output.send(chunk).is_err() {
            return false;
        }
        self.pending.pop_front();
        self.emitted += 1;
        true
    }

    pub fn emit_all(&mut self) -> usize {
        let mut count = 0;
        while self.emit_next() {
            count += 1;
        }
        count
    }
}

impl VideoEncoder for SyntheticEncoder {
    fn encode_queue_size(&self) -> usize {
        self.pending.len()
    }

    fn encode(&mut self, frame: CapturedFrame, key_frame: bool) -> Result<(), StreamError> {
        if frame.data.is_empty() {
            return Err(StreamError::Codec("empty frame".to_string()));
        }
        self.width = frame.width;
        self.height = frame.height;
        self.pending.push_back((frame.timestamp, key_frame));
        Ok(())
    }

    /// Queued work belongs to the old configuration and is discarded.
    fn reconfigure(&mut self, width: u32, height: u32) -> Result<(), StreamError> {
        self.pending.clear();
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// Chunks accepted by a [`RecordingDecoder`], shared with the test
#[derive(Debug, Clone, Default)]
pub struct DecodedFrames {
    inner: Arc<Mutex<DecodedLog>>,
}

#[derive(Debug, Default)]
struct DecodedLog {
    chunks: Vec<EncodedChunk>,
    rejected: u64,
    resets: u64,
}

impl DecodedFrames {
    fn with<R>(&self, f: impl FnOnce(&mut DecodedLog) -> R) -> R {
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *log)
    }

    pub fn len(&self) -> usize {
        self.with(|log| log.chunks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunks(&self) -> Vec<EncodedChunk> {
        self.with(|log| log.chunks.clone())
    }

    pub fn timestamps(&self) -> Vec<u32> {
        self.with(|log| log.chunks.iter().map(|c| c.timestamp).collect())
    }

    pub fn rejected(&self) -> u64 {
        self.with(|log| log.rejected)
    }

    pub fn resets(&self) -> u64 {
        self.with(|log| log.resets)
    }
}

#[derive(Debug, Default)]
pub struct RecordingDecoder {
    frames: DecodedFrames,
    has_reference: bool,
}

impl RecordingDecoder {
    pub fn new() -> (Self, DecodedFrames) {
        let decoder = Self::default();
        let frames = decoder.frames.clone();
        (decoder, frames)
    }
}

impl VideoDecoder for RecordingDecoder {
    fn decode(&mut self, chunk: EncodedChunk) -> Result<(), StreamError> {
        let error = if !chunk.is_key_frame() && !self.has_reference {
            Some(format!("delta frame {} without a key frame", chunk.timestamp))
        } else if !is_synthetic_payload(chunk.timestamp, &chunk.data) {
            Some(format!("corrupt payload for frame {}", chunk.timestamp))
        } else {
            None
        };

        if let Some(message) = error {
            self.frames.with(|log| log.rejected += 1);
            return Err(StreamError::Codec(message));
        }

        self.has_reference = true;
        self.frames.with(|log| log.chunks.push(chunk));
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StreamError> {
        self.has_reference = false;
        self.frames.with(|log| log.resets += 1);
        Ok(())
    }
}
