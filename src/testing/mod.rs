//! Testing utilities for CrabCast
//!
//! Deterministic capture frames and a stand-in codec, so pipelines can run
//! end to end without camera or codec hardware.

pub mod codec;
pub mod synthetic_data;

pub use codec::{DecodedFrames, RecordingDecoder, SyntheticEncoder};
pub use synthetic_data::{is_synthetic_payload, synthetic_frame, synthetic_payload};
