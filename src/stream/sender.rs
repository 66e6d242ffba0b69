//! Send pipeline: capture admission, encoding, packetization, transport
//!
//! A single sequential worker drives a [`FrameSender`]: captured frames go
//! through [`FrameSender::on_captured`], and every chunk the encoder emits
//! goes through [`FrameSender::on_encoded`] in emission order.

use tokio::sync::mpsc;
use uuid::Uuid;

use super::backpressure::{Admission, CaptureGate};
use super::epoch::EpochController;
use super::pool::BufferPool;
use super::stats::SenderStats;
use crate::codec::{CapturedFrame, EncodedChunk, VideoEncoder};
use crate::config::CrabCastConfig;
use crate::errors::StreamError;
use crate::timing::{rate_per_sec, StreamClock};
use crate::transport::PacketSink;
use crate::wire::{FrameId, Packetizer};

#[derive(Debug, Default, Clone)]
struct SendCounters {
    frames_sent: u64,
    packets_sent: u64,
    bytes_sent: u64,
    send_errors: u64,
}

pub struct FrameSender<E, S> {
    stream_id: String,
    encoder: E,
    sink: S,
    packetizer: Packetizer,
    pool: BufferPool,
    epoch: EpochController,
    stream_epoch: u8,
    gate: CaptureGate,
    next_frame_id: FrameId,
    counters: SendCounters,
    clock: StreamClock,
}

impl<E: VideoEncoder, S: PacketSink> FrameSender<E, S> {
    /// Build a sender. The effective packet size is the smaller of the
    /// configured one and what the sink accepts.
    pub fn new(
        config: &CrabCastConfig,
        encoder: E,
        sink: S,
        epoch: EpochController,
    ) -> Result<Self, StreamError> {
        config.validate()?;

        let max_packet_size = config.transport.max_packet_size.min(sink.max_packet_size());
        let packetizer = Packetizer::new(max_packet_size)?;
        let stream_epoch = epoch.current();
        let stream_id = Uuid::new_v4().to_string();

        log::info!(
            "Sender {} ready: {}x{} {:?}, {} byte packets, epoch {}",
            stream_id,
            config.video.width,
            config.video.height,
            config.video.codec,
            max_packet_size,
            stream_epoch
        );

        Ok(Self {
            stream_id,
            encoder,
            sink,
            pool: BufferPool::new(max_packet_size),
            packetizer,
            epoch,
            stream_epoch,
            gate: CaptureGate::new(
                config.encoder.max_encode_queue,
                config.encoder.keyframe_interval,
            ),
            next_frame_id: FrameId::new(0),
            counters: SendCounters::default(),
            clock: StreamClock::new(),
        })
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn epoch(&self) -> u8 {
        self.stream_epoch
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn packetizer(&self) -> &Packetizer {
        &self.packetizer
    }

    /// Offer one captured frame to the encoder, subject to backpressure.
    pub fn on_captured(&mut self, frame: CapturedFrame) -> Result<Admission, StreamError> {
        self.follow_epoch();

        let admission = self.gate.admit(self.encoder.encode_queue_size());
        if let Admission::Encode { key_frame } = admission {
            self.encoder.encode(frame, key_frame)?;
        }
        Ok(admission)
    }

    /// Packetize one encoded chunk and hand it to the sink.
    ///
    /// A chunk too large for one frame fails without consuming a frame id.
    /// A transport failure does consume it; the receiver recovers at the
    /// next key frame.
    pub fn on_encoded(&mut self, chunk: &EncodedChunk) -> Result<FrameId, StreamError> {
        let frame_id = self.next_frame_id;
        let packets = self
            .packetizer
            .packetize(chunk, frame_id, self.stream_epoch)
            .inspect_err(|e| log::error!("Cannot packetize frame {}: {}", frame_id, e))?;
        self.next_frame_id = frame_id.next();

        let buffers: Vec<Vec<u8>> = packets
            .iter()
            .map(|packet| {
                let mut buf = self.pool.acquire();
                packet.write_into(&mut buf);
                buf
            })
            .collect();
        let bytes: usize = buffers.iter().map(Vec::len).sum();
        let result = self.sink.send_packets(&buffers);
        self.pool.release(buffers);

        if let Err(e) = result {
            self.counters.send_errors += 1;
            log::warn!("Failed to send frame {}: {}", frame_id, e);
            return Err(e);
        }

        self.counters.frames_sent += 1;
        self.counters.packets_sent += packets.len() as u64;
        self.counters.bytes_sent += bytes as u64;
        log::trace!(
            "Sent frame {} ({} packets, {} bytes, key={})",
            frame_id,
            packets.len(),
            bytes,
            chunk.is_key_frame()
        );
        Ok(frame_id)
    }

    /// Send every chunk the encoder has emitted so far.
    pub fn pump(
        &mut self,
        output: &mut mpsc::UnboundedReceiver<EncodedChunk>,
    ) -> Result<usize, StreamError> {
        let mut sent = 0;
        while let Ok(chunk) = output.try_recv() {
            self.on_encoded(&chunk)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Apply a new resolution and start a new stream generation.
    ///
    /// Returns the new epoch. Chunks the encoder already emitted into
    /// `output` belong to the old generation and are discarded unsent. The
    /// encoder must not emit chunks queued before this call afterwards.
    pub fn reconfigure(
        &mut self,
        width: u32,
        height: u32,
        output: &mut mpsc::UnboundedReceiver<EncodedChunk>,
    ) -> Result<u8, StreamError> {
        self.encoder.reconfigure(width, height)?;

        let mut discarded = 0usize;
        while output.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            log::debug!(
                "Sender {} discarded {} unsent chunks from epoch {}",
                self.stream_id,
                discarded,
                self.stream_epoch
            );
        }

        let epoch = self.epoch.advance();
        self.follow_epoch();
        log::info!("Sender {} reconfigured to {}x{}", self.stream_id, width, height);
        Ok(epoch)
    }

    /// Pick up an epoch advanced elsewhere: the next admitted frame is key.
    fn follow_epoch(&mut self) {
        let current = self.epoch.current();
        if current == self.stream_epoch {
            return;
        }
        log::info!(
            "Sender {} switching from epoch {} to {}",
            self.stream_id,
            self.stream_epoch,
            current
        );
        self.stream_epoch = current;
        self.gate.restart();
        self.counters = SendCounters::default();
        self.clock = StreamClock::new();
    }

    pub fn stats(&self) -> SenderStats {
        let admission = self.gate.counters();
        let elapsed_secs = self.clock.elapsed_secs();
        SenderStats {
            stream_id: self.stream_id.clone(),
            epoch: self.stream_epoch,
            frames_captured: admission.frames_captured,
            frames_encoded: admission.frames_admitted,
            frames_dropped: admission.frames_dropped,
            keyframes_forced: admission.keyframes_forced,
            frames_sent: self.counters.frames_sent,
            packets_sent: self.counters.packets_sent,
            bytes_sent: self.counters.bytes_sent,
            send_errors: self.counters.send_errors,
            elapsed_secs,
            capture_fps: rate_per_sec(admission.frames_captured, elapsed_secs),
            send_fps: rate_per_sec(self.counters.frames_sent, elapsed_secs),
        }
    }
}
