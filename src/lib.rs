//! CrabCast: live video frames over lossy, size-limited datagram transports
//!
//! Each encoded frame is split into packets that fit the transport's
//! maximum packet size. Every packet carries a 10-byte header (stream
//! epoch, key-frame flag, frame id, sequence number, packet count,
//! timestamp). The receiver reassembles frames from packets that arrive
//! lost, duplicated or reordered, and hands complete frames to the decoder
//! in an order it can decode.
//!
//! # Layout
//! - [`wire`]: header codec, frame ids, packetizer
//! - [`reassembly`]: per-frame reassembly store and delivery sequencer
//! - [`stream`]: send/receive pipelines, epoch, backpressure, statistics
//! - [`transport`]: packet sink seam and an in-process lossy link
//! - [`codec`]: encoder/decoder seams
//!
//! # Usage
//! ```rust,ignore
//! let config = CrabCastConfig::load_or_default();
//! let epoch = EpochController::new();
//! let (link, datagrams) = LossyLink::new(config.transport.max_packet_size, LinkConditions::perfect());
//!
//! let mut sender = FrameSender::new(&config, encoder, link, epoch.clone())?;
//! let receiver = FrameReceiver::new(&config, decoder, epoch)?;
//! tokio::spawn(async move { receiver.run(datagrams).await });
//!
//! sender.on_captured(frame)?;
//! sender.on_encoded(&chunk)?;
//! ```
pub mod codec;
pub mod config;
pub mod errors;
pub mod invariant_ppt;
pub mod reassembly;
pub mod stream;
pub mod timing;
pub mod transport;
pub mod wire;

// Testing utilities - deterministic frames and a stand-in codec
pub mod testing;

// Re-exports for convenience
pub use codec::{CapturedFrame, EncodedChunk, FrameType, VideoDecoder, VideoEncoder};
pub use config::CrabCastConfig;
pub use errors::StreamError;
pub use reassembly::{DeliverySequencer, IngestOutcome, ReassemblyStore};
pub use stream::{
    Admission, EpochController, FrameReceiver, FrameSender, ReceiverStats, SenderStats,
};
pub use transport::{LinkConditions, LossyLink, PacketSink};
pub use wire::{FrameId, Packet, PacketHeader, Packetizer, HEADER_SIZE};

/// Initialize logging for the streaming engine
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabcast=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        header_size: HEADER_SIZE,
        max_packets_per_frame: wire::MAX_PACKETS_PER_FRAME,
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub header_size: usize,
    pub max_packets_per_frame: usize,
}
