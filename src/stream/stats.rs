//! Stream statistics snapshots

use serde::{Deserialize, Serialize};

use crate::reassembly::{DeliveryCounters, ReassemblyCounters};

/// Sender side, since the last (re)configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderStats {
    pub stream_id: String,
    pub epoch: u8,
    pub frames_captured: u64,
    pub frames_encoded: u64,
    pub frames_dropped: u64,
    pub keyframes_forced: u64,
    pub frames_sent: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub elapsed_secs: f64,
    pub capture_fps: f64,
    pub send_fps: f64,
}

/// Receiver side, since the last epoch change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverStats {
    pub stream_id: String,
    pub epoch: u8,
    pub pending_frames: usize,
    pub reassembly: ReassemblyCounters,
    pub delivery: DeliveryCounters,
    pub decode_errors: u64,
    pub elapsed_secs: f64,
    pub render_fps: f64,
}

impl ReceiverStats {
    pub fn frames_delivered(&self) -> u64 {
        self.delivery.frames_delivered
    }
}
