//! Deterministic frames and chunk payloads
//!
//! Captured frames carry a gradient that changes every frame. Encoded
//! payloads are a byte pattern derived from the chunk timestamp, so a
//! decoder can tell whether reassembly handed it exactly what was sent.

use crate::codec::CapturedFrame;

/// A raw RGB24 frame with content that differs from frame to frame
pub fn synthetic_frame(frame_number: u64, width: u32, height: u32, timestamp: u32) -> CapturedFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    CapturedFrame {
        data,
        width,
        height,
        timestamp,
    }
}

/// Payload bytes a synthetic encoder emits for `timestamp`
pub fn synthetic_payload(timestamp: u32, len: usize) -> Vec<u8> {
    let seed = timestamp.to_be_bytes();
    (0..len)
        .map(|i| seed[i % 4].wrapping_add((i / 4) as u8))
        .collect()
}

/// True when `data` is exactly what [`synthetic_payload`] produces
pub fn is_synthetic_payload(timestamp: u32, data: &[u8]) -> bool {
    data == synthetic_payload(timestamp, data.len()).as_slice()
}
