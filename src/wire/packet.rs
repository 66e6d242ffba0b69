use bytes::{BufMut, Bytes, BytesMut};

use super::header::{PacketHeader, HEADER_SIZE};
use crate::errors::StreamError;

/// One datagram: header plus a slice of the chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(header: PacketHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Serialized size in bytes
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Write the packet into `buf`, replacing its contents.
    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.clear();
        buf.reserve(self.wire_len());
        self.header.encode(buf);
        buf.extend_from_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.header.encode(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a received datagram. The payload shares the datagram's buffer.
    pub fn parse(datagram: Bytes) -> Result<Self, StreamError> {
        let header = PacketHeader::decode(&datagram)?;
        let payload = datagram.slice(HEADER_SIZE..);
        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::FrameId;

    #[test]
    fn test_parse_shares_payload() {
        let header = PacketHeader {
            epoch: 0,
            is_key_frame: false,
            frame_id: FrameId::new(7),
            seq: 1,
            count: 2,
            timestamp: 33,
        };
        let packet = Packet::new(header, Bytes::from_static(b"abc"));

        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), packet.wire_len());

        let parsed = Packet::parse(bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_write_into_reuses_buffer() {
        let header = PacketHeader {
            epoch: 1,
            is_key_frame: true,
            frame_id: FrameId::new(1),
            seq: 0,
            count: 1,
            timestamp: 0,
        };
        let packet = Packet::new(header, Bytes::from_static(&[9; 5]));

        let mut buf = vec![0xFF; 64];
        packet.write_into(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE + 5);
        assert_eq!(&buf[..HEADER_SIZE], &header.to_bytes());
    }

    #[test]
    fn test_parse_header_only_datagram() {
        let header = PacketHeader {
            epoch: 0,
            is_key_frame: false,
            frame_id: FrameId::new(0),
            seq: 0,
            count: 1,
            timestamp: 0,
        };
        let parsed = Packet::parse(Bytes::copy_from_slice(&header.to_bytes())).unwrap();
        assert!(parsed.payload.is_empty());
    }
}
