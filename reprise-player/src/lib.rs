//! # Reprise Player
//!
//! Timed packet replay engine for recorded game sessions.
//!
//! This crate reads a recorded packet log and plays it back into a viewer:
//! - In real time (scaled by a speed multiplier) on a timing thread
//! - Or on demand, up to an explicit timestamp
//! - With pause, jumps forwards and backwards, and restart
//! - Through the replay filter from [`reprise_core`], which turns the
//!   recording player's session into a spectator session
//!
//! ## Example
//!
//! ```rust,no_run
//! use reprise_player::config::ReplayConfig;
//! use reprise_player::replay::{BasicHost, DirectorySource, Mode, ReplaySender};
//!
//! let source = DirectorySource::open("my_replay").unwrap();
//! let (tx, rx) = crossbeam::channel::unbounded::<Vec<u8>>();
//! let sender = ReplaySender::new(
//!     source,
//!     BasicHost::new(true),
//!     tx,
//!     Mode::Sync,
//!     &ReplayConfig::default(),
//! )
//! .unwrap();
//!
//! sender.play_until(60_000).unwrap();
//! println!("{} packets in the first minute", rx.try_iter().count());
//! ```
//!
//! ## CLI
//!
//! See [`Cli`] for all options. Key options:
//! - `<REPLAY>` - Extracted replay directory
//! - `--until <MS>` - Play up to a timestamp in sync mode and exit
//! - `--speed <X>` - Speed multiplier for real-time playback
//! - `-v` - Increase verbosity (use multiple times)

use clap::Parser;
use std::path::PathBuf;

pub mod config;
pub mod error;
pub mod replay;

pub use error::ReplayError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Play a recorded game session")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Extracted replay directory (containing recording.tmcpr)
    pub replay: PathBuf,

    /// Playback speed multiplier
    #[arg(short, long)]
    pub speed: Option<f64>,

    /// Deliver everything up to this timestamp (ms) without real-time pacing, then exit
    #[arg(short, long)]
    pub until: Option<u32>,

    /// Drop chat messages
    #[arg(long, default_value_t = false)]
    pub no_chat: bool,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
