//! End-to-end sender -> lossy link -> receiver runs.
//!
//! Sender and receiver live in one process, connected by the in-process
//! link, with the receiver consuming datagrams on its own task.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;

use crabcast::config::CrabCastConfig;
use crabcast::stream::{EpochController, FrameReceiver, FrameSender, ReceiverStats};
use crabcast::testing::{synthetic_frame, DecodedFrames, RecordingDecoder, SyntheticEncoder};
use crabcast::transport::{LinkConditions, LossyLink};

struct Run {
    receiver: ReceiverStats,
    decoded: DecodedFrames,
    frames_sent: u64,
    /// Capture timestamp of the first frame after reconfiguration
    switched_at: Option<u32>,
    /// Capture timestamp of a frame still in the encoder output at the switch
    orphaned: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    /// Everything encoded so far has been sent
    Drained,
    /// One encoded frame has not been pumped yet
    OutputInFlight,
}

async fn run_pipeline(
    config: CrabCastConfig,
    conditions: LinkConditions,
    frames: u64,
    reconfigure_at: Option<(u64, Switch)>,
) -> Run {
    let (link, datagrams) = LossyLink::new(config.transport.max_packet_size, conditions);
    let link = Arc::new(link);
    let epoch = EpochController::new();

    let (encoder, mut chunks) = SyntheticEncoder::channel();
    let (decoder, decoded) = RecordingDecoder::new();
    let mut sender = FrameSender::new(&config, encoder, Arc::clone(&link), epoch.clone()).unwrap();
    let receiver = FrameReceiver::new(&config, decoder, epoch).unwrap();

    let task = {
        let receiver = receiver.clone();
        tokio::spawn(async move { receiver.run(datagrams).await })
    };

    let mut frames_sent = 0;
    let mut switched_at = None;
    let mut orphaned = None;
    for n in 0..frames {
        let timestamp = (n * 33_333) as u32;
        if let Some((_, switch)) = reconfigure_at.filter(|(at, _)| *at == n) {
            // let the receiver catch up so the switch lands between frames
            timeout(Duration::from_secs(5), async {
                while (decoded.len() as u64) < n {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("receiver fell behind");

            if switch == Switch::OutputInFlight {
                sender.on_captured(synthetic_frame(n, 16, 12, timestamp)).unwrap();
                sender.encoder_mut().emit_all();
                orphaned = Some(timestamp);
                sender.reconfigure(320, 240, &mut chunks).unwrap();
                continue;
            }
            sender.reconfigure(320, 240, &mut chunks).unwrap();
            switched_at = Some(timestamp);
        }
        if orphaned.is_some() && switched_at.is_none() {
            switched_at = Some(timestamp);
        }
        sender.on_captured(synthetic_frame(n, 16, 12, timestamp)).unwrap();
        sender.encoder_mut().emit_all();
        sender.pump(&mut chunks).unwrap();
        frames_sent += 1;
        tokio::task::yield_now().await;
    }

    drop(sender);
    drop(link);

    let receiver = timeout(Duration::from_secs(5), task)
        .await
        .expect("receiver did not finish")
        .expect("receiver task panicked");

    Run {
        receiver,
        decoded,
        frames_sent,
        switched_at,
        orphaned,
    }
}

fn assert_monotonic(decoded: &DecodedFrames) {
    let timestamps = decoded.timestamps();
    assert!(
        timestamps.windows(2).all(|w| w[0] < w[1]),
        "decoded out of order: {:?}",
        timestamps
    );
}

#[tokio::test]
async fn perfect_link_delivers_every_frame() {
    let run = run_pipeline(CrabCastConfig::default(), LinkConditions::perfect(), 90, None).await;

    assert_eq!(run.decoded.len() as u64, run.frames_sent);
    assert_eq!(run.decoded.rejected(), 0);
    assert_eq!(run.receiver.pending_frames, 0);
    assert_eq!(run.receiver.reassembly.stale_epoch, 0);
    assert_monotonic(&run.decoded);
}

#[tokio::test]
async fn reordering_and_duplication_lose_nothing() {
    let conditions = LinkConditions {
        loss_rate: 0.0,
        duplicate_rate: 0.2,
        reorder_window: 6,
        seed: 11,
    };
    let run = run_pipeline(CrabCastConfig::default(), conditions, 120, None).await;

    assert_eq!(run.decoded.len() as u64, run.frames_sent);
    assert_eq!(run.decoded.rejected(), 0);
    let reassembly = &run.receiver.reassembly;
    assert!(reassembly.duplicates + reassembly.late > 0);
    assert_monotonic(&run.decoded);
}

#[tokio::test]
async fn lossy_link_stays_decodable() {
    let mut config = CrabCastConfig::default();
    config.encoder.keyframe_interval = 10;
    let run = run_pipeline(config, LinkConditions::lossy(0.05, 3), 300, None).await;

    // Whatever got through decoded cleanly and in order
    assert_eq!(run.decoded.rejected(), 0);
    assert_eq!(run.receiver.decode_errors, 0);
    assert!(!run.decoded.is_empty());
    assert!((run.decoded.len() as u64) < run.frames_sent);
    assert_monotonic(&run.decoded);
}

#[tokio::test]
async fn reconfiguration_mid_stream_starts_clean() {
    let run = run_pipeline(
        CrabCastConfig::default(),
        LinkConditions::perfect(),
        60,
        Some((30, Switch::Drained)),
    )
    .await;

    let switched_at = run.switched_at.unwrap();
    assert_eq!(run.decoded.resets(), 1);
    assert_eq!(run.decoded.rejected(), 0);
    assert_eq!(run.receiver.epoch, 1);

    // Counters restart with the new generation
    assert_eq!(run.receiver.delivery.frames_delivered, 30);
    let first_after = run
        .decoded
        .chunks()
        .into_iter()
        .find(|c| c.timestamp >= switched_at)
        .unwrap();
    assert!(first_after.is_key_frame());
    assert_eq!(run.decoded.len(), 60);
}

#[tokio::test]
async fn reconfiguration_with_output_in_flight_discards_old_chunk() {
    let run = run_pipeline(
        CrabCastConfig::default(),
        LinkConditions::perfect(),
        60,
        Some((30, Switch::OutputInFlight)),
    )
    .await;

    let orphaned = run.orphaned.unwrap();
    assert!(!run.decoded.timestamps().contains(&orphaned));
    assert_eq!(run.decoded.len(), 59);
    assert_eq!(run.decoded.rejected(), 0);
    assert_eq!(run.decoded.resets(), 1);
    assert_eq!(run.receiver.epoch, 1);
    assert_eq!(run.receiver.reassembly.stale_epoch, 0);
    assert_eq!(run.receiver.delivery.frames_delivered, 29);

    let switched_at = run.switched_at.unwrap();
    let first_after = run
        .decoded
        .chunks()
        .into_iter()
        .find(|c| c.timestamp >= switched_at)
        .unwrap();
    assert!(first_after.is_key_frame());
    assert_monotonic(&run.decoded);
}

#[tokio::test]
async fn concurrent_streams_are_independent() {
    let runs = join_all((0..3u64).map(|seed| {
        run_pipeline(
            CrabCastConfig::default(),
            LinkConditions {
                reorder_window: 4,
                seed,
                ..LinkConditions::perfect()
            },
            40,
            None,
        )
    }))
    .await;

    for run in runs {
        assert_eq!(run.decoded.len(), 40);
        assert_eq!(run.decoded.rejected(), 0);
        assert_eq!(run.receiver.epoch, 0);
        assert_monotonic(&run.decoded);
    }
}
