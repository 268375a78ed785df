use clap::Parser;
use log::{debug, info, warn};
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use reprise_core::protocol::PacketReader;
use reprise_core::PacketKind;
use reprise_player::config::ReplayConfig;
use reprise_player::replay::{BasicHost, DirectorySource, Mode, ReplaySender};
use reprise_player::{Cli, VERSION};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    info!("reprise-player {}", VERSION);

    let mut config = match &args.config {
        Some(path) => ReplayConfig::load(path).into_diagnostic()?,
        None => ReplayConfig::default(),
    };
    if let Some(speed) = args.speed {
        config.speed = speed;
    }

    let source = DirectorySource::open(&args.replay).into_diagnostic()?;
    let (tx, rx) = crossbeam::channel::unbounded::<Vec<u8>>();

    // Stand-in viewer: tally what would have been shown
    let viewer = thread::Builder::new()
        .name("viewer".to_string())
        .spawn(move || {
            let mut seen: BTreeMap<&'static str, usize> = BTreeMap::new();
            for packet in rx {
                let name = PacketReader::new(&packet)
                    .read_varint()
                    .and_then(PacketKind::from_id)
                    .map(PacketKind::name)
                    .unwrap_or("Unknown");
                debug!("{} ({} bytes)", name, packet.len());
                *seen.entry(name).or_default() += 1;
            }
            seen
        })
        .into_diagnostic()?;

    let mode = if args.until.is_some() {
        Mode::Sync
    } else {
        Mode::Async
    };
    let sender = ReplaySender::new(source, BasicHost::new(!args.no_chat), tx, mode, &config)
        .into_diagnostic()?;

    match args.until {
        Some(until) => sender.play_until(until).into_diagnostic()?,
        None => {
            // The timing thread pauses at the end of the log
            let mut since_progress = Duration::ZERO;
            while !sender.is_terminated() && !sender.is_paused() {
                thread::sleep(config.poll_interval() * 10);
                since_progress += config.poll_interval() * 10;
                if since_progress >= PROGRESS_INTERVAL {
                    since_progress = Duration::ZERO;
                    info!(
                        "{}ms / {}ms",
                        sender.current_timestamp(),
                        sender.duration_ms()
                    );
                }
            }
        }
    }

    let status = sender.status();
    println!(
        "{}",
        serde_json::to_string_pretty(&status).into_diagnostic()?
    );

    // Dropping the sender closes the channel
    drop(sender);
    match viewer.join() {
        Ok(seen) => {
            for (name, count) in seen {
                info!("{:>6} {}", count, name);
            }
        }
        Err(_) => warn!("Viewer thread panicked"),
    }

    Ok(())
}
