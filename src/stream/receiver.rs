//! Receive pipeline: datagrams in, ordered decoded frames out
//!
//! Store, sequencer and decoder live behind one lock. Ingestion, delivery
//! and decoding of a datagram happen under it, and so does the reset on an
//! epoch change, which makes the change atomic with respect to ingestion.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::epoch::{EpochController, EpochListener};
use super::stats::ReceiverStats;
use crate::codec::VideoDecoder;
use crate::config::CrabCastConfig;
use crate::errors::StreamError;
use crate::reassembly::{DeliverySequencer, ReassemblyStore};
use crate::timing::{rate_per_sec, StreamClock};

struct ReceiveState<D> {
    store: ReassemblyStore,
    sequencer: DeliverySequencer,
    decoder: D,
    decode_errors: u64,
    clock: StreamClock,
}

impl<D: VideoDecoder> ReceiveState<D> {
    fn restart(&mut self, epoch: u8) {
        let discarded = self.store.reset(epoch);
        self.sequencer.reset();
        self.decode_errors = 0;
        self.clock = StreamClock::new();
        if let Err(e) = self.decoder.reset() {
            log::warn!("Decoder reset failed: {}", e);
        }
        log::info!(
            "Receiver moved to epoch {}, discarded {} pending frames",
            epoch,
            discarded
        );
    }
}

impl<D: VideoDecoder> EpochListener for ReceiveState<D> {
    fn on_epoch(&mut self, epoch: u8) {
        self.restart(epoch);
    }
}

pub struct FrameReceiver<D> {
    stream_id: String,
    epoch: EpochController,
    state: Arc<Mutex<ReceiveState<D>>>,
}

impl<D> Clone for FrameReceiver<D> {
    fn clone(&self) -> Self {
        Self {
            stream_id: self.stream_id.clone(),
            epoch: self.epoch.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<D: VideoDecoder + 'static> FrameReceiver<D> {
    /// Build a receiver at the controller's current epoch. It follows every
    /// later advance of `epoch`.
    pub fn new(
        config: &CrabCastConfig,
        decoder: D,
        epoch: EpochController,
    ) -> Result<Self, StreamError> {
        config.validate()?;

        let state = Arc::new(Mutex::new(ReceiveState {
            store: ReassemblyStore::with_window(epoch.current(), config.reassembly.window),
            sequencer: DeliverySequencer::new(),
            decoder,
            decode_errors: 0,
            clock: StreamClock::new(),
        }));
        let listener: Arc<Mutex<dyn EpochListener>> = state.clone();
        epoch.attach(&listener);

        let receiver = Self {
            stream_id: Uuid::new_v4().to_string(),
            epoch,
            state,
        };

        // An advance between reading the epoch and attaching would be missed
        let current = receiver.epoch.current();
        {
            let mut state = receiver.lock();
            if state.store.epoch() != current {
                state.restart(current);
            }
        }

        log::info!(
            "Receiver {} ready at epoch {}",
            receiver.stream_id,
            current
        );
        Ok(receiver)
    }
}

impl<D: VideoDecoder> FrameReceiver<D> {
    fn lock(&self) -> MutexGuard<'_, ReceiveState<D>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn epoch(&self) -> u8 {
        self.lock().store.epoch()
    }

    pub fn pending_frames(&self) -> usize {
        self.lock().store.len()
    }

    /// Ingest one datagram, then decode every frame that became deliverable.
    ///
    /// Returns the number of frames handed to the decoder. A per-packet
    /// error only means this packet (or its frame) was discarded.
    pub fn on_datagram(&self, datagram: Bytes) -> Result<usize, StreamError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let outcome = state.store.ingest(datagram);
        if let Err(e) = &outcome {
            log::debug!("Discarded datagram: {}", e);
        }

        let ready = state.sequencer.drain(&mut state.store);
        let delivered = ready.len();
        for chunk in ready {
            let timestamp = chunk.timestamp;
            if let Err(e) = state.decoder.decode(chunk) {
                state.decode_errors += 1;
                log::warn!("Decoder rejected frame with timestamp {}: {}", timestamp, e);
            }
        }

        outcome.map(|_| delivered)
    }

    /// Consume the receive stream until the transport closes it.
    ///
    /// Pending partial frames are discarded on the way out. Returns the
    /// statistics as they stood when the stream ended.
    pub async fn run(&self, mut datagrams: mpsc::UnboundedReceiver<Bytes>) -> ReceiverStats {
        log::info!("Receiver {} listening", self.stream_id);

        while let Some(datagram) = datagrams.recv().await {
            if let Err(e) = self.on_datagram(datagram) {
                if !e.is_per_packet() {
                    log::warn!("Receiver {}: {}", self.stream_id, e);
                }
            }
        }

        let stats = self.stats();
        let discarded = self.shutdown();
        log::info!(
            "Receive stream for {} closed after {} frames; discarded {} pending",
            self.stream_id,
            stats.frames_delivered(),
            discarded
        );
        stats
    }

    /// Start a new stream generation locally. Returns the new epoch.
    pub fn reconfigure(&self) -> u8 {
        self.epoch.advance()
    }

    /// Adopt an epoch signaled by a remote sender.
    pub fn reset_epoch(&self, epoch: u8) {
        let mut state = self.lock();
        if state.store.epoch() != epoch {
            state.restart(epoch);
        }
    }

    /// Discard every pending entry without delivering it.
    pub fn shutdown(&self) -> usize {
        self.lock().store.clear()
    }

    pub fn stats(&self) -> ReceiverStats {
        let state = self.lock();
        let elapsed_secs = state.clock.elapsed_secs();
        let delivery = state.sequencer.counters().clone();
        ReceiverStats {
            stream_id: self.stream_id.clone(),
            epoch: state.store.epoch(),
            pending_frames: state.store.len(),
            reassembly: state.store.counters().clone(),
            render_fps: rate_per_sec(delivery.frames_delivered, elapsed_secs),
            delivery,
            decode_errors: state.decode_errors,
            elapsed_secs,
        }
    }
}
