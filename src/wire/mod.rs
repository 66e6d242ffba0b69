//! Wire format: packet header codec, wrapping frame ids and the packetizer.
pub mod frame_id;
pub mod header;
pub mod packet;
pub mod packetizer;

pub use frame_id::FrameId;
pub use header::{PacketHeader, HEADER_SIZE};
pub use packet::Packet;
pub use packetizer::{Packetizer, MAX_PACKETS_PER_FRAME};
