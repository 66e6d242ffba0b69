//! Per-frame reassembly buffers
//!
//! Packets arrive in any order, duplicated, or not at all. Each frame id gets
//! one [`ReassemblyEntry`] with a fixed slot per `seq`. The store is the only
//! owner of entries; the delivery sequencer asks it for complete frames.
//!
//! # Eviction
//!
//! - Delivery removes an entry.
//! - A key frame completing purges every entry before it and moves the
//!   delivery cursor to just before it. This is the only way stranded
//!   partial frames are reclaimed, so recovery from loss waits for the next
//!   key frame.
//! - Epoch change discards everything ([`ReassemblyStore::reset`]).
//! - Delta packets beyond `window` frames past the cursor, or that would
//!   grow the store past `window` entries, are refused.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::assert_invariant;
use crate::codec::{EncodedChunk, FrameType};
use crate::errors::StreamError;
use crate::wire::{FrameId, Packet, PacketHeader};

/// Default number of frames the store tracks ahead of the delivery cursor
pub const DEFAULT_WINDOW: u16 = 512;

/// Largest window that keeps serial comparison unambiguous
pub const MAX_WINDOW: u16 = i16::MAX as u16;

/// Accumulated packets for one frame
#[derive(Debug)]
pub struct ReassemblyEntry {
    slots: Vec<Option<Bytes>>,
    received_count: usize,
    is_key_frame: bool,
    timestamp: u32,
    epoch: u8,
}

impl ReassemblyEntry {
    fn new(header: &PacketHeader) -> Self {
        Self {
            slots: vec![None; header.count as usize],
            received_count: 0,
            is_key_frame: header.is_key_frame,
            timestamp: header.timestamp,
            epoch: header.epoch,
        }
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn received_count(&self) -> usize {
        self.received_count
    }

    pub fn is_complete(&self) -> bool {
        self.received_count == self.slots.len()
    }

    pub fn is_key_frame(&self) -> bool {
        self.is_key_frame
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn epoch(&self) -> u8 {
        self.epoch
    }

    /// Store `payload` at `seq`. Returns true if the slot was empty.
    ///
    /// A filled slot is overwritten (last write wins) without touching the
    /// received count.
    fn insert(&mut self, seq: u8, payload: Bytes) -> bool {
        let slot = &mut self.slots[seq as usize];
        let newly_filled = slot.is_none();
        *slot = Some(payload);
        if newly_filled {
            self.received_count += 1;
        }

        assert_invariant!(
            self.received_count <= self.slots.len(),
            "Received count never exceeds packet count",
            "ReassemblyEntry::insert"
        );
        newly_filled
    }

    /// Concatenate the slots in `seq` order. Only valid once complete.
    pub(crate) fn into_chunk(self) -> EncodedChunk {
        let frame_type = FrameType::from_key_flag(self.is_key_frame);
        let mut slots = self.slots.into_iter().flatten();

        let data = if self.received_count == 1 {
            slots.next().unwrap_or_default()
        } else {
            let mut parts: Vec<Bytes> = Vec::with_capacity(self.received_count);
            parts.extend(slots);
            let total = parts.iter().map(Bytes::len).sum();
            let mut buf = BytesMut::with_capacity(total);
            for part in &parts {
                buf.extend_from_slice(part);
            }
            buf.freeze()
        };

        EncodedChunk::new(data, frame_type, self.timestamp)
    }
}

/// What happened to one ingested packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored in its frame's entry
    Buffered {
        frame_id: FrameId,
        complete: bool,
        /// Entries dropped because this packet completed a key frame
        purged: usize,
    },
    /// Slot already filled; payload replaced, count unchanged
    Duplicate { frame_id: FrameId },
    /// Packet from another stream generation
    StaleEpoch { epoch: u8 },
    /// Frame at or before the delivery cursor
    Late { frame_id: FrameId },
    /// Delta frame outside the tracked window
    OutOfWindow { frame_id: FrameId },
}

/// Per-store packet accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyCounters {
    pub packets_received: u64,
    pub stale_epoch: u64,
    pub malformed: u64,
    pub inconsistent: u64,
    pub duplicates: u64,
    pub late: u64,
    pub out_of_window: u64,
    pub entries_purged: u64,
    pub keyframe_resyncs: u64,
}

#[derive(Debug)]
pub struct ReassemblyStore {
    epoch: u8,
    window: u16,
    entries: HashMap<FrameId, ReassemblyEntry>,
    last_delivered: Option<FrameId>,
    counters: ReassemblyCounters,
}

impl ReassemblyStore {
    pub fn new(epoch: u8) -> Self {
        Self::with_window(epoch, DEFAULT_WINDOW)
    }

    pub fn with_window(epoch: u8, window: u16) -> Self {
        Self {
            epoch,
            window: window.clamp(1, MAX_WINDOW),
            entries: HashMap::new(),
            last_delivered: None,
            counters: ReassemblyCounters::default(),
        }
    }

    pub fn epoch(&self) -> u8 {
        self.epoch
    }

    pub fn window(&self) -> u16 {
        self.window
    }

    pub fn last_delivered(&self) -> Option<FrameId> {
        self.last_delivered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, frame_id: FrameId) -> Option<&ReassemblyEntry> {
        self.entries.get(&frame_id)
    }

    pub fn counters(&self) -> &ReassemblyCounters {
        &self.counters
    }

    /// Ingest one received datagram.
    ///
    /// `Err` means the packet (or, for an inconsistent count, its whole
    /// frame) was discarded. Neither stops the stream.
    pub fn ingest(&mut self, datagram: Bytes) -> Result<IngestOutcome, StreamError> {
        self.counters.packets_received += 1;

        let packet = Packet::parse(datagram).inspect_err(|_| {
            self.counters.malformed += 1;
        })?;
        self.ingest_packet(packet)
    }

    /// Ingest an already parsed packet.
    pub fn ingest_packet(&mut self, packet: Packet) -> Result<IngestOutcome, StreamError> {
        let Packet { header, payload } = packet;
        let frame_id = header.frame_id;

        if header.epoch != self.epoch {
            self.counters.stale_epoch += 1;
            log::debug!(
                "Discarding packet for frame {} from epoch {} (current {})",
                frame_id,
                header.epoch,
                self.epoch
            );
            return Ok(IngestOutcome::StaleEpoch {
                epoch: header.epoch,
            });
        }

        if header.count == 0 || header.seq >= header.count {
            self.counters.malformed += 1;
            return Err(StreamError::MalformedPacket(format!(
                "frame {}: seq {} out of range for count {}",
                frame_id, header.seq, header.count
            )));
        }

        if let Some(last) = self.last_delivered {
            if frame_id.is_at_or_before(last) {
                self.counters.late += 1;
                log::debug!("Discarding late packet for frame {} (delivered up to {})", frame_id, last);
                return Ok(IngestOutcome::Late { frame_id });
            }
        }

        if !self.entries.contains_key(&frame_id) && !header.is_key_frame && !self.in_window(frame_id) {
            self.counters.out_of_window += 1;
            log::debug!("Refusing frame {} outside the reassembly window", frame_id);
            return Ok(IngestOutcome::OutOfWindow { frame_id });
        }

        let entry = self
            .entries
            .entry(frame_id)
            .or_insert_with(|| ReassemblyEntry::new(&header));

        if entry.count() != header.count as usize {
            let expected = entry.count() as u8;
            self.entries.remove(&frame_id);
            self.counters.inconsistent += 1;
            log::warn!(
                "Frame {} announced {} packets, earlier packets said {}; dropping frame",
                frame_id,
                header.count,
                expected
            );
            return Err(StreamError::InconsistentFrameHeader {
                frame_id: frame_id.value(),
                expected,
                actual: header.count,
            });
        }

        if !entry.insert(header.seq, payload) {
            self.counters.duplicates += 1;
            return Ok(IngestOutcome::Duplicate { frame_id });
        }

        let complete = entry.is_complete();
        let purged = if complete && entry.is_key_frame() {
            self.resync_on_keyframe(frame_id)
        } else {
            0
        };

        Ok(IngestOutcome::Buffered {
            frame_id,
            complete,
            purged,
        })
    }

    fn in_window(&self, frame_id: FrameId) -> bool {
        if self.entries.len() >= self.window as usize {
            return false;
        }
        match self.last_delivered {
            Some(last) => frame_id.distance_from(last) <= self.window as i16,
            None => true,
        }
    }

    /// A complete key frame needs nothing before it: drop every older entry
    /// and move the cursor so the key frame is next in line.
    fn resync_on_keyframe(&mut self, key_id: FrameId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|id, _| id.distance_from(key_id) >= 0);
        let purged = before - self.entries.len();

        let cursor = key_id.prev();
        let skipped = matches!(self.last_delivered, Some(last) if last != cursor);
        if purged > 0 || skipped {
            self.counters.keyframe_resyncs += 1;
            log::info!(
                "Key frame {} complete: purged {} stale entries, resuming after {:?}",
                key_id,
                purged,
                self.last_delivered
            );
        }
        self.counters.entries_purged += purged as u64;
        self.last_delivered = Some(cursor);
        purged
    }

    /// Pending frame ids in serial order starting at the delivery cursor.
    pub(crate) fn pending_in_order(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self.entries.keys().copied().collect();
        let origin = match self.last_delivered {
            Some(last) => last.next(),
            None => match ids
                .iter()
                .copied()
                .min_by(|a, b| a.serial_cmp(*b))
            {
                Some(oldest) => oldest,
                None => return ids,
            },
        };
        ids.sort_by_key(|id| id.offset_from(origin));
        ids
    }

    /// Remove `frame_id` for delivery and advance the cursor to it.
    pub(crate) fn take_for_delivery(&mut self, frame_id: FrameId) -> Option<ReassemblyEntry> {
        let entry = self.entries.remove(&frame_id)?;

        assert_invariant!(
            self.last_delivered.map_or(true, |last| frame_id.is_after(last)),
            "Delivered frame ids strictly advance",
            "ReassemblyStore::take_for_delivery"
        );
        self.last_delivered = Some(frame_id);
        Some(entry)
    }

    /// Swap in an empty store for `epoch`. Returns the number of pending
    /// entries discarded.
    pub fn reset(&mut self, epoch: u8) -> usize {
        let fresh = ReassemblyStore::with_window(epoch, self.window);
        let old = std::mem::replace(self, fresh);
        old.entries.len()
    }

    /// Drop all pending entries without delivering them.
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }
}
