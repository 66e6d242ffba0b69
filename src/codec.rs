//! Encoder/decoder seams
//!
//! Compression itself is external. The engine only needs an encoder that
//! reports how much work it has in flight and emits chunks on its own
//! schedule, and a decoder that accepts ordered chunks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::StreamError;

/// Frame type of an encoded chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    Keyframe, // self-contained
    Delta,    // depends on the previous frame
}

impl FrameType {
    pub fn from_key_flag(is_key_frame: bool) -> Self {
        if is_key_frame {
            FrameType::Keyframe
        } else {
            FrameType::Delta
        }
    }

    pub fn is_key(self) -> bool {
        matches!(self, FrameType::Keyframe)
    }
}

/// One compressed video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Bytes,
    pub frame_type: FrameType,
    pub timestamp: u32,
}

impl EncodedChunk {
    pub fn new(data: impl Into<Bytes>, frame_type: FrameType, timestamp: u32) -> Self {
        Self {
            data: data.into(),
            frame_type,
            timestamp,
        }
    }

    pub fn is_key_frame(&self) -> bool {
        self.frame_type.is_key()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Raw frame handed over by capture, before encoding
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: u32,
}

/// Video encoder collaborator.
///
/// `encode` only queues work. Encoded chunks are emitted asynchronously
/// through whatever output the implementation was built with.
pub trait VideoEncoder: Send {
    /// Frames accepted by `encode` that have not been emitted yet
    fn encode_queue_size(&self) -> usize;

    fn encode(&mut self, frame: CapturedFrame, key_frame: bool) -> Result<(), StreamError>;

    /// Apply a new resolution. Called on stream reconfiguration.
    fn reconfigure(&mut self, _width: u32, _height: u32) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Video decoder collaborator. Chunks arrive in delivery order.
pub trait VideoDecoder: Send {
    fn decode(&mut self, chunk: EncodedChunk) -> Result<(), StreamError>;

    /// Drop decoder state. Called on stream reconfiguration.
    fn reset(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}
