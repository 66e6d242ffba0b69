//! In-process lossy datagram link
//!
//! Connects a sender and a receiver in the same process. Loss, duplication
//! and reordering are drawn from a seeded ChaCha8 RNG, so a run is
//! reproducible given the same seed and the same packet sequence.
//!
//! Reordering holds up to `reorder_window` packets back and releases a
//! random one each time the window overflows. [`LossyLink::flush`] releases
//! whatever is still held; dropping the link flushes and then closes the
//! receive channel.

use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::PacketSink;
use crate::errors::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkConditions {
    /// Probability in [0, 1] that a packet is lost
    pub loss_rate: f64,
    /// Probability in [0, 1] that a delivered packet arrives twice
    pub duplicate_rate: f64,
    /// Packets held back for reordering (0 = in order)
    pub reorder_window: usize,
    pub seed: u64,
}

impl LinkConditions {
    pub fn perfect() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_window: 0,
            seed: 0,
        }
    }

    /// Moderate impairment: the given loss, 1% duplication, reordering
    /// within 8 packets.
    pub fn lossy(loss_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate,
            duplicate_rate: 0.01,
            reorder_window: 8,
            seed,
        }
    }
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self::perfect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounters {
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub packets_duplicated: u64,
    pub packets_delivered: u64,
    pub oversized: u64,
}

struct LinkState {
    rng: ChaCha8Rng,
    conditions: LinkConditions,
    held: Vec<Bytes>,
    counters: LinkCounters,
}

pub struct LossyLink {
    max_packet_size: usize,
    tx: mpsc::UnboundedSender<Bytes>,
    state: Mutex<LinkState>,
}

impl LossyLink {
    /// Create a link and the receive stream it feeds.
    pub fn new(
        max_packet_size: usize,
        conditions: LinkConditions,
    ) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conditions = LinkConditions {
            loss_rate: conditions.loss_rate.clamp(0.0, 1.0),
            duplicate_rate: conditions.duplicate_rate.clamp(0.0, 1.0),
            ..conditions
        };
        let link = Self {
            max_packet_size,
            tx,
            state: Mutex::new(LinkState {
                rng: ChaCha8Rng::seed_from_u64(conditions.seed),
                conditions,
                held: Vec::new(),
                counters: LinkCounters::default(),
            }),
        };
        (link, rx)
    }

    pub fn conditions(&self) -> LinkConditions {
        self.lock().conditions
    }

    pub fn counters(&self) -> LinkCounters {
        self.lock().counters.clone()
    }

    /// Release every packet held for reordering. Packets that can no longer
    /// be delivered are counted as lost.
    pub fn flush(&self) -> Result<(), StreamError> {
        let mut state = self.lock();
        let mut held = std::mem::take(&mut state.held).into_iter();
        while let Some(datagram) = held.next() {
            if let Err(e) = self.deliver(&mut state, datagram) {
                state.counters.packets_lost += held.len() as u64;
                return Err(e);
            }
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, state: &mut LinkState, datagram: Bytes) -> Result<(), StreamError> {
        if self.tx.send(datagram).is_err() {
            state.counters.packets_lost += 1;
            return Err(StreamError::Transport("receive side closed".to_string()));
        }
        state.counters.packets_delivered += 1;
        Ok(())
    }
}

impl PacketSink for LossyLink {
    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn send_packets(&self, packets: &[Vec<u8>]) -> Result<(), StreamError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        for packet in packets {
            if packet.len() > self.max_packet_size {
                state.counters.oversized += 1;
                return Err(StreamError::Transport(format!(
                    "datagram of {} bytes exceeds max packet size {}",
                    packet.len(),
                    self.max_packet_size
                )));
            }
            state.counters.packets_sent += 1;

            let LinkConditions {
                loss_rate,
                duplicate_rate,
                reorder_window,
                ..
            } = state.conditions;

            if state.rng.gen_bool(loss_rate) {
                state.counters.packets_lost += 1;
                continue;
            }

            let datagram = Bytes::copy_from_slice(packet);
            if state.rng.gen_bool(duplicate_rate) {
                state.counters.packets_duplicated += 1;
                state.held.push(datagram.clone());
            }
            state.held.push(datagram);

            while state.held.len() > reorder_window {
                let index = if reorder_window == 0 {
                    0
                } else {
                    state.rng.gen_range(0..state.held.len())
                };
                let datagram = state.held.remove(index);
                self.deliver(state, datagram)?;
            }
        }

        Ok(())
    }
}

impl Drop for LossyLink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::debug!("Loopback link dropped with undelivered packets: {}", e);
        }
    }
}
