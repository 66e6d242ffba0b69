//! Capture backpressure against a slow encoder.

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crabcast::codec::{EncodedChunk, VideoEncoder};
use crabcast::config::CrabCastConfig;
use crabcast::stream::{Admission, EpochController, FrameSender};
use crabcast::testing::{synthetic_frame, SyntheticEncoder};
use crabcast::transport::{LinkConditions, LossyLink};
use crabcast::wire::Packet;

type Harness = (
    FrameSender<SyntheticEncoder, LossyLink>,
    UnboundedReceiver<EncodedChunk>,
    UnboundedReceiver<Bytes>,
);

fn sender(max_encode_queue: usize) -> Harness {
    let mut config = CrabCastConfig::default();
    config.encoder.max_encode_queue = max_encode_queue;
    let (encoder, chunks) = SyntheticEncoder::channel();
    let (link, datagrams) = LossyLink::new(1200, LinkConditions::perfect());
    let sender = FrameSender::new(&config, encoder, link, EpochController::new()).unwrap();
    (sender, chunks, datagrams)
}

#[test]
fn saturated_encoder_drops_exactly_k_frames() {
    let (mut sender, _chunks, _datagrams) = sender(2);

    // queue depth 0, 1, 2 are all admitted
    for n in 0..3 {
        let admission = sender.on_captured(synthetic_frame(n, 16, 16, n as u32)).unwrap();
        assert!(matches!(admission, Admission::Encode { .. }));
    }
    assert_eq!(sender.encoder().encode_queue_size(), 3);

    const K: u64 = 17;
    for n in 0..K {
        let admission = sender
            .on_captured(synthetic_frame(3 + n, 16, 16, (3 + n) as u32))
            .unwrap();
        assert_eq!(admission, Admission::Drop);
    }

    let stats = sender.stats();
    assert_eq!(stats.frames_dropped, K);
    assert_eq!(stats.frames_encoded, 3);
    assert_eq!(stats.frames_captured, 3 + K);
    assert_eq!(sender.encoder().encode_queue_size(), 3);
}

#[test]
fn draining_the_encoder_resumes_admission() {
    let (mut sender, mut chunks, _datagrams) = sender(0);

    assert!(matches!(
        sender.on_captured(synthetic_frame(0, 8, 8, 0)).unwrap(),
        Admission::Encode { key_frame: true }
    ));
    assert_eq!(
        sender.on_captured(synthetic_frame(1, 8, 8, 1)).unwrap(),
        Admission::Drop
    );

    assert_eq!(sender.encoder_mut().emit_all(), 1);
    assert!(chunks.try_recv().unwrap().is_key_frame());
    assert_eq!(
        sender.on_captured(synthetic_frame(2, 8, 8, 2)).unwrap(),
        Admission::Encode { key_frame: false }
    );
}

#[test]
fn keyframe_cadence_counts_admitted_frames() {
    let mut config = CrabCastConfig::default();
    config.encoder.keyframe_interval = 4;
    let (encoder, mut chunks) = SyntheticEncoder::channel();
    let (link, mut datagrams) = LossyLink::new(1200, LinkConditions::perfect());
    let mut sender = FrameSender::new(&config, encoder, link, EpochController::new()).unwrap();

    for n in 0..9u64 {
        sender.on_captured(synthetic_frame(n, 8, 8, n as u32)).unwrap();
        sender.encoder_mut().emit_all();
    }
    sender.pump(&mut chunks).unwrap();

    let mut keys = Vec::new();
    while let Ok(datagram) = datagrams.try_recv() {
        let packet = Packet::parse(datagram).unwrap();
        if packet.header.is_key_frame && packet.header.seq == 0 {
            keys.push(packet.header.frame_id.value());
        }
    }
    // first frame, then the 4th and 8th admitted
    assert_eq!(keys, vec![0, 3, 7]);
}
