//! Replay playback.
//!
//! This module provides functionality to:
//! - Read packet logs (`.tmcpr`) from a replay directory or memory
//! - Play them into a viewer in real time or up to a timestamp
//! - Extract embedded resource packs for the viewer
//!
//! ## Packet Log Format
//!
//! A packet log is a bare sequence of frames, all integers big-endian:
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Frame 0                  │  i32 timestamp (ms), i32 length, payload
//! │ Frame 1                  │  payload = VarInt packet id + packet body
//! │ ...                      │
//! └──────────────────────────┘
//! ```
//!
//! There is no header and no index; seeking backwards reads again from the
//! first frame.

pub mod host;
pub mod packet_log;
pub mod resource_pack;
pub mod sender;
pub mod source;
mod timing;

#[cfg(test)]
pub(crate) mod test_support;

pub use host::{BasicHost, PacketSink, ReplayHost};
pub use packet_log::{Frame, PacketLogReader};
pub use resource_pack::ResourcePackCache;
pub use sender::{Mode, ReplaySender, ReplayStatus, SenderState};
pub use source::{DirectorySource, MemorySource, ReplayMetadata, ReplaySource};
