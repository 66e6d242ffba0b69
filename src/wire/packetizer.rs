//! Chunk → packet splitting
//!
//! `max_payload = max_packet_size - HEADER_SIZE`. A chunk becomes
//! `ceil(len / max_payload)` packets in order, with `seq` 0..count.
//! An empty chunk still yields one empty packet so that completion on the
//! receiver is always `received == count`.

use super::frame_id::FrameId;
use super::header::{PacketHeader, HEADER_SIZE};
use super::packet::Packet;
use crate::assert_invariant;
use crate::codec::EncodedChunk;
use crate::errors::StreamError;

/// Largest `count` representable in the one-byte header field
pub const MAX_PACKETS_PER_FRAME: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy)]
pub struct Packetizer {
    max_packet_size: usize,
}

impl Packetizer {
    /// Fails if a packet of `max_packet_size` cannot carry a header plus at
    /// least one payload byte.
    pub fn new(max_packet_size: usize) -> Result<Self, StreamError> {
        if max_packet_size <= HEADER_SIZE {
            return Err(StreamError::Config(format!(
                "max packet size {} must exceed the {}-byte header",
                max_packet_size, HEADER_SIZE
            )));
        }
        Ok(Self { max_packet_size })
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    pub fn max_payload(&self) -> usize {
        self.max_packet_size - HEADER_SIZE
    }

    /// Number of packets a chunk of `len` bytes needs.
    pub fn packet_count(&self, len: usize) -> Result<u8, StreamError> {
        let max_payload = self.max_payload();
        let packets = len.div_ceil(max_payload).max(1);
        if packets > MAX_PACKETS_PER_FRAME {
            return Err(StreamError::ChunkTooLarge {
                len,
                packets,
                max_payload,
            });
        }
        Ok(packets as u8)
    }

    /// Split `chunk` into packets stamped with `frame_id` and `epoch`.
    ///
    /// Payloads are slices of the chunk buffer; nothing is copied.
    pub fn packetize(
        &self,
        chunk: &EncodedChunk,
        frame_id: FrameId,
        epoch: u8,
    ) -> Result<Vec<Packet>, StreamError> {
        let count = self.packet_count(chunk.len())?;
        let max_payload = self.max_payload();

        let mut packets = Vec::with_capacity(count as usize);
        for seq in 0..count {
            let start = seq as usize * max_payload;
            let end = (start + max_payload).min(chunk.len());
            let header = PacketHeader {
                epoch,
                is_key_frame: chunk.is_key_frame(),
                frame_id,
                seq,
                count,
                timestamp: chunk.timestamp,
            };
            let packet = Packet::new(header, chunk.data.slice(start..end));

            assert_invariant!(
                packet.wire_len() <= self.max_packet_size,
                "Packet must fit within the max packet size",
                "Packetizer::packetize"
            );
            packets.push(packet);
        }

        log::trace!(
            "Packetized frame {} ({} bytes) into {} packets",
            frame_id,
            chunk.len(),
            count
        );
        Ok(packets)
    }
}
