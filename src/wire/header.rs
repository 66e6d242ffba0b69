//! Fixed 10-byte packet header
//!
//! ```text
//! offset  field         type
//! 0       epoch         u8
//! 1       key frame     u8 (0/1)
//! 2..4    frame_id      u16 big-endian
//! 4       seq           u8
//! 5       count         u8
//! 6..10   timestamp     u32 big-endian
//! 10..    payload
//! ```
//!
//! Only length is checked on decode. Semantic checks (`seq < count`,
//! epoch filtering) belong to the reassembly store.

use bytes::{Buf, BufMut};

use super::frame_id::FrameId;
use crate::errors::StreamError;

/// Serialized header length in bytes
pub const HEADER_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub epoch: u8,
    pub is_key_frame: bool,
    pub frame_id: FrameId,
    pub seq: u8,
    pub count: u8,
    pub timestamp: u32,
}

impl PacketHeader {
    /// Append the header to `buf` in wire order.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.epoch);
        buf.put_u8(u8::from(self.is_key_frame));
        buf.put_u16(self.frame_id.value());
        buf.put_u8(self.seq);
        buf.put_u8(self.count);
        buf.put_u32(self.timestamp);
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Decode a header from the start of `data`.
    ///
    /// Any non-zero key byte is read as a key frame.
    pub fn decode(mut data: &[u8]) -> Result<Self, StreamError> {
        if data.len() < HEADER_SIZE {
            return Err(StreamError::MalformedPacket(format!(
                "need {} header bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        Ok(Self {
            epoch: data.get_u8(),
            is_key_frame: data.get_u8() != 0,
            frame_id: FrameId::new(data.get_u16()),
            seq: data.get_u8(),
            count: data.get_u8(),
            timestamp: data.get_u32(),
        })
    }
}
