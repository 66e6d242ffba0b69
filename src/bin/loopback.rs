use anyhow::{bail, Context, Result};
use crabcast::stream::{EpochController, FrameReceiver, FrameSender, ReceiverStats, SenderStats};
use crabcast::testing::{synthetic_frame, RecordingDecoder, SyntheticEncoder};
use crabcast::timing::StreamClock;
use crabcast::transport::{LinkConditions, LinkCounters, LossyLink};
use crabcast::CrabCastConfig;
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

const USAGE: &str = "Usage: crabcast-loopback [--frames <n>] [--loss <0..1>] [--seed <n>] \
                     [--reorder <n>] [--reconfigure-at <frame>] [--config <path>] [--json]";

struct Options {
    frames: u64,
    loss: f64,
    seed: u64,
    reorder: Option<usize>,
    reconfigure_at: Option<u64>,
    config: Option<PathBuf>,
    json: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options {
            frames: 300,
            loss: 0.0,
            seed: 1,
            reorder: None,
            reconfigure_at: None,
            config: None,
            json: false,
        };

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--frames" => options.frames = next_value(args, &mut i)?.parse()?,
                "--loss" => options.loss = next_value(args, &mut i)?.parse()?,
                "--seed" => options.seed = next_value(args, &mut i)?.parse()?,
                "--reorder" => options.reorder = Some(next_value(args, &mut i)?.parse()?),
                "--reconfigure-at" => {
                    options.reconfigure_at = Some(next_value(args, &mut i)?.parse()?)
                }
                "--config" => options.config = Some(PathBuf::from(next_value(args, &mut i)?)),
                "--json" => options.json = true,
                "--help" | "-h" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                }
                other => bail!("Unknown argument: {}\n{}", other, USAGE),
            }
            i += 1;
        }

        if !(0.0..=1.0).contains(&options.loss) {
            bail!("--loss must be between 0 and 1");
        }
        Ok(options)
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value),
        None => bail!("{} needs a value", flag),
    }
}

#[derive(Serialize)]
struct Report {
    sender: SenderStats,
    receiver: ReceiverStats,
    link: LinkCounters,
    frames_decoded: usize,
    decoder_rejected: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    crabcast::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = Options::parse(&args)?;

    let config = match &options.config {
        Some(path) => CrabCastConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CrabCastConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    let mut conditions = LinkConditions::lossy(options.loss, options.seed);
    if let Some(window) = options.reorder {
        conditions.reorder_window = window;
    }
    let (link, datagrams) = LossyLink::new(config.transport.max_packet_size, conditions);
    let link = Arc::new(link);

    let epoch = EpochController::new();
    let (encoder, mut chunks) = SyntheticEncoder::channel();
    let (decoder, decoded) = RecordingDecoder::new();
    let mut sender = FrameSender::new(&config, encoder, Arc::clone(&link), epoch.clone())?;
    let receiver = FrameReceiver::new(&config, decoder, epoch)?;

    let receive_task = {
        let receiver = receiver.clone();
        tokio::spawn(async move { receiver.run(datagrams).await })
    };

    let mut ticker = interval(Duration::from_secs(1) / config.video.framerate);
    let clock = StreamClock::new();
    let (mut width, mut height) = (config.video.width, config.video.height);

    for n in 0..options.frames {
        ticker.tick().await;
        if options.reconfigure_at == Some(n) {
            width *= 2;
            height *= 2;
            let new_epoch = sender.reconfigure(width, height, &mut chunks)?;
            log::info!("Frame {}: switched to {}x{} (epoch {})", n, width, height, new_epoch);
        }

        let timestamp = clock.timestamp();
        sender.on_captured(synthetic_frame(n, width, height, timestamp))?;
        sender.encoder_mut().emit_all();
        if let Err(e) = sender.pump(&mut chunks) {
            log::warn!("Frame {} not sent: {}", n, e);
        }
    }

    link.flush()?;
    let sender_stats = sender.stats();
    let link_counters = link.counters();
    drop(sender);
    drop(link);

    let receiver_stats = receive_task.await.context("receiver task failed")?;
    let report = Report {
        sender: sender_stats,
        receiver: receiver_stats,
        link: link_counters,
        frames_decoded: decoded.len(),
        decoder_rejected: decoded.rejected(),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &Report) {
    let s = &report.sender;
    let r = &report.receiver;
    println!("epoch {}", r.epoch);
    println!(
        "sent:      {} frames ({} captured, {} dropped, {} key), {} packets, {} bytes",
        s.frames_sent, s.frames_captured, s.frames_dropped, s.keyframes_forced, s.packets_sent, s.bytes_sent
    );
    println!(
        "link:      {} lost, {} duplicated, {} delivered",
        report.link.packets_lost, report.link.packets_duplicated, report.link.packets_delivered
    );
    println!(
        "received:  {} packets, {} stale, {} late, {} duplicate, {} malformed",
        r.reassembly.packets_received,
        r.reassembly.stale_epoch,
        r.reassembly.late,
        r.reassembly.duplicates,
        r.reassembly.malformed
    );
    println!(
        "delivered: {} frames ({} key), {} resyncs, {} entries purged, {} pending at close",
        r.delivery.frames_delivered,
        r.delivery.keyframes_delivered,
        r.reassembly.keyframe_resyncs,
        r.reassembly.entries_purged,
        r.pending_frames
    );
    println!(
        "decoded:   {} frames, {} rejected",
        report.frames_decoded, report.decoder_rejected
    );
}
