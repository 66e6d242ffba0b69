//! Datagram transport seam
//!
//! The engine sends through a [`PacketSink`] and receives from a tokio
//! channel of datagrams. Delivery is unreliable: any packet may be lost,
//! duplicated or reordered.

pub mod loopback;

use std::sync::Arc;

use crate::errors::StreamError;

pub use loopback::{LinkConditions, LinkCounters, LossyLink};

/// Unreliable, size-limited packet sink
pub trait PacketSink: Send + Sync {
    /// Largest datagram accepted, header included
    fn max_packet_size(&self) -> usize;

    /// Hand a batch of packets to the transport. The buffers may be reused
    /// by the caller as soon as this returns.
    fn send_packets(&self, packets: &[Vec<u8>]) -> Result<(), StreamError>;
}

impl<T: PacketSink + ?Sized> PacketSink for Arc<T> {
    fn max_packet_size(&self) -> usize {
        (**self).max_packet_size()
    }

    fn send_packets(&self, packets: &[Vec<u8>]) -> Result<(), StreamError> {
        (**self).send_packets(packets)
    }
}
