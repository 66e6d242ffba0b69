//! Ordered hand-off of complete frames to the decoder
//!
//! Frames are considered in serial order from the store's delivery cursor.
//! A delta frame is only eligible when it is exactly the next frame id; the
//! first gap in front of a delta stops the scan, because delta frames
//! decoded out of order corrupt the picture. Key frames are always eligible
//! and are how the stream resynchronizes after loss.

use serde::{Deserialize, Serialize};

use super::store::ReassemblyStore;
use crate::codec::EncodedChunk;

/// Delivery accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounters {
    pub frames_delivered: u64,
    pub keyframes_delivered: u64,
    pub bytes_delivered: u64,
    /// Frames whose timestamp went backwards relative to the previous one
    pub timestamp_regressions: u64,
}

#[derive(Debug, Default)]
pub struct DeliverySequencer {
    last_timestamp: Option<u32>,
    counters: DeliveryCounters,
}

impl DeliverySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &DeliveryCounters {
        &self.counters
    }

    /// Remove and return every frame that can be decoded now, in order.
    pub fn drain(&mut self, store: &mut ReassemblyStore) -> Vec<EncodedChunk> {
        let mut ready = Vec::new();

        for frame_id in store.pending_in_order() {
            let (is_key_frame, complete) = match store.entry(frame_id) {
                Some(entry) => (entry.is_key_frame(), entry.is_complete()),
                None => continue,
            };

            let in_order = store
                .last_delivered()
                .is_some_and(|last| frame_id == last.next());
            if !in_order && !is_key_frame {
                break;
            }

            if !complete {
                continue;
            }

            if let Some(entry) = store.take_for_delivery(frame_id) {
                let chunk = entry.into_chunk();
                self.record(&chunk);
                log::trace!(
                    "Delivering frame {} ({:?}, {} bytes, ts {})",
                    frame_id,
                    chunk.frame_type,
                    chunk.len(),
                    chunk.timestamp
                );
                ready.push(chunk);
            }
        }

        ready
    }

    fn record(&mut self, chunk: &EncodedChunk) {
        if let Some(previous) = self.last_timestamp {
            if chunk.timestamp < previous {
                self.counters.timestamp_regressions += 1;
                log::warn!(
                    "Frame timestamp went backwards: {} after {}",
                    chunk.timestamp,
                    previous
                );
            }
        }
        self.last_timestamp = Some(chunk.timestamp);

        self.counters.frames_delivered += 1;
        self.counters.bytes_delivered += chunk.len() as u64;
        if chunk.is_key_frame() {
            self.counters.keyframes_delivered += 1;
        }
    }

    /// Forget timestamp history and counters, for a new stream generation.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
