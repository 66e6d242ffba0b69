//! Contract tests: the engine's runtime invariants are actually evaluated
//! by the scenarios that depend on them.

use crabcast::codec::{EncodedChunk, FrameType};
use crabcast::config::CrabCastConfig;
use crabcast::invariant_ppt::{clear_invariant_log, contract_test, times_checked};
use crabcast::reassembly::{DeliverySequencer, ReassemblyStore};
use crabcast::stream::{EpochController, FrameReceiver};
use crabcast::testing::{synthetic_payload, RecordingDecoder};
use crabcast::wire::{FrameId, Packetizer};

const PACKET_FITS: &str = "Packet must fit within the max packet size";
const COUNT_BOUNDED: &str = "Received count never exceeds packet count";
const DELIVERY_ADVANCES: &str = "Delivered frame ids strictly advance";

#[test]
fn contract_packetizer() {
    clear_invariant_log();

    let packetizer = Packetizer::new(64).unwrap();
    let chunk = EncodedChunk::new(vec![1u8; 1000], FrameType::Keyframe, 0);
    let packets = packetizer.packetize(&chunk, FrameId::new(0), 0).unwrap();

    contract_test("packetizer", &[PACKET_FITS]);
    assert_eq!(times_checked(PACKET_FITS), packets.len() as u64);
}

#[test]
fn contract_reassembly_and_delivery() {
    clear_invariant_log();

    let packetizer = Packetizer::new(64).unwrap();
    let mut store = ReassemblyStore::new(0);
    let mut sequencer = DeliverySequencer::new();

    for id in 0..5u16 {
        let chunk = EncodedChunk::new(
            vec![id as u8; 200],
            FrameType::from_key_flag(id == 0),
            id as u32,
        );
        for packet in packetizer.packetize(&chunk, FrameId::new(id), 0).unwrap() {
            // every packet twice
            store.ingest(packet.to_bytes()).unwrap();
            store.ingest(packet.to_bytes()).unwrap();
        }
        sequencer.drain(&mut store);
    }

    contract_test(
        "reassembly_and_delivery",
        &[PACKET_FITS, COUNT_BOUNDED, DELIVERY_ADVANCES],
    );
    assert_eq!(times_checked(DELIVERY_ADVANCES), 5);
}

#[test]
fn contract_receive_loop() {
    clear_invariant_log();

    let (decoder, decoded) = RecordingDecoder::new();
    let receiver =
        FrameReceiver::new(&CrabCastConfig::default(), decoder, EpochController::new()).unwrap();
    let packetizer = Packetizer::new(100).unwrap();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    for id in 0..3u16 {
        let chunk = EncodedChunk::new(
            synthetic_payload(id as u32, 250),
            FrameType::from_key_flag(id == 0),
            id as u32,
        );
        for packet in packetizer.packetize(&chunk, FrameId::new(id), 0).unwrap().iter().rev() {
            tx.send(packet.to_bytes()).unwrap();
        }
    }
    drop(tx);

    // block_on keeps the loop on this thread, where invariant checks are recorded
    let stats = tokio_test::block_on(receiver.run(rx));

    assert_eq!(stats.frames_delivered(), 3);
    assert_eq!(decoded.len(), 3);
    contract_test("receive_loop", &[COUNT_BOUNDED, DELIVERY_ADVANCES]);
}

#[test]
#[should_panic(expected = "CONTRACT FAILURE")]
fn contract_detects_unexercised_invariant() {
    clear_invariant_log();
    contract_test("nothing_ran", &[DELIVERY_ADVANCES]);
}
