use thiserror::Error;

/// Errors produced by the packetization and reassembly engine.
///
/// Per-packet variants (`MalformedPacket`, `InconsistentFrameHeader`) are
/// local to one packet or one frame and never stop the stream. `ChunkTooLarge`
/// and `Config` point at misconfiguration and are surfaced to the caller.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Inconsistent header for frame {frame_id}: expected {expected} packets, got {actual}")]
    InconsistentFrameHeader {
        frame_id: u16,
        expected: u8,
        actual: u8,
    },

    #[error("Chunk of {len} bytes needs {packets} packets (max 255) at {max_payload} bytes per packet")]
    ChunkTooLarge {
        len: usize,
        packets: usize,
        max_payload: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// True for errors that only affect a single packet or frame.
    pub fn is_per_packet(&self) -> bool {
        matches!(
            self,
            StreamError::MalformedPacket(_) | StreamError::InconsistentFrameHeader { .. }
        )
    }
}
