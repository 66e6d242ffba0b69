//! Capture admission
//!
//! Decides, per captured frame, whether it goes to the encoder at all and
//! whether it must be a key frame.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ENCODE_QUEUE: usize = 2;
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 150;

/// Verdict for one captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Encode { key_frame: bool },
    /// Encoder is saturated; the frame is discarded
    Drop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionCounters {
    pub frames_captured: u64,
    pub frames_admitted: u64,
    pub frames_dropped: u64,
    pub keyframes_forced: u64,
}

#[derive(Debug, Clone)]
pub struct CaptureGate {
    max_encode_queue: usize,
    keyframe_interval: u32,
    awaiting_first_frame: bool,
    counters: AdmissionCounters,
}

impl CaptureGate {
    /// A `keyframe_interval` of 0 only forces the first frame.
    pub fn new(max_encode_queue: usize, keyframe_interval: u32) -> Self {
        Self {
            max_encode_queue,
            keyframe_interval,
            awaiting_first_frame: true,
            counters: AdmissionCounters::default(),
        }
    }

    pub fn counters(&self) -> &AdmissionCounters {
        &self.counters
    }

    /// Judge one captured frame given the encoder's current in-flight depth.
    pub fn admit(&mut self, encode_queue_size: usize) -> Admission {
        self.counters.frames_captured += 1;

        if encode_queue_size > self.max_encode_queue {
            self.counters.frames_dropped += 1;
            log::debug!(
                "Encoder queue at {} (max {}), dropping captured frame",
                encode_queue_size,
                self.max_encode_queue
            );
            return Admission::Drop;
        }

        self.counters.frames_admitted += 1;
        let on_cadence = self.keyframe_interval > 0
            && self.counters.frames_admitted % self.keyframe_interval as u64 == 0;
        let key_frame = self.awaiting_first_frame || on_cadence;
        self.awaiting_first_frame = false;

        if key_frame {
            self.counters.keyframes_forced += 1;
        }
        Admission::Encode { key_frame }
    }

    /// Start over after reconfiguration: the next admitted frame is key.
    pub fn restart(&mut self) {
        self.awaiting_first_frame = true;
        self.counters = AdmissionCounters::default();
    }
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENCODE_QUEUE, DEFAULT_KEYFRAME_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_key() {
        let mut gate = CaptureGate::default();
        assert_eq!(gate.admit(0), Admission::Encode { key_frame: true });
        assert_eq!(gate.admit(0), Admission::Encode { key_frame: false });
    }

    #[test]
    fn test_keyframe_cadence() {
        let mut gate = CaptureGate::new(2, 5);
        let keys: Vec<u32> = (1..=15)
            .filter(|_| gate.admit(0) == Admission::Encode { key_frame: true })
            .collect();
        assert_eq!(keys, vec![1, 5, 10, 15]);
        assert_eq!(gate.counters().keyframes_forced, 4);
    }

    #[test]
    fn test_saturated_encoder_drops_every_frame() {
        let mut gate = CaptureGate::new(2, 150);
        for _ in 0..7 {
            assert_eq!(gate.admit(3), Admission::Drop);
        }
        assert_eq!(gate.counters().frames_dropped, 7);
        assert_eq!(gate.counters().frames_admitted, 0);
    }

    #[test]
    fn test_queue_at_threshold_is_admitted() {
        let mut gate = CaptureGate::new(2, 150);
        assert!(matches!(gate.admit(2), Admission::Encode { .. }));
    }

    #[test]
    fn test_drops_do_not_consume_first_key() {
        let mut gate = CaptureGate::new(1, 150);
        assert_eq!(gate.admit(5), Admission::Drop);
        assert_eq!(gate.admit(0), Admission::Encode { key_frame: true });
    }

    #[test]
    fn test_restart_forces_key_and_clears_counters() {
        let mut gate = CaptureGate::default();
        gate.admit(0);
        gate.admit(0);
        gate.admit(9);
        gate.restart();
        assert_eq!(gate.counters(), &AdmissionCounters::default());
        assert_eq!(gate.admit(0), Admission::Encode { key_frame: true });
    }
}
