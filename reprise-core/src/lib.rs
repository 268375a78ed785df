//! # Reprise Core
//!
//! Platform-independent packet decoding and replay filtering for recorded
//! game sessions.
//!
//! This crate contains pure parsing and filtering logic with **zero I/O
//! dependencies**: no files, no threads, no clocks. The player crate owns
//! timing, the packet log and the viewer integration.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  reprise-core (pure, no I/O)                             │
//! │  ├── protocol/     (VarInts, packet ids, Message)        │
//! │  ├── transform     (spectator filter: Message → Verdict) │
//! │  └── restrictions  (Replay|Restrict directives)          │
//! └──────────────────────────────────────────────────────────┘
//!                           ▲
//!              ┌────────────┴────────────┐
//!              │  reprise-player         │
//!              │  (packet log, timing,   │
//!              │   sender, CLI)          │
//!              └─────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`protocol`] - Wire primitives and the typed [`Message`] model
//! - [`transform`] - The replay filter ([`transform::apply`])
//! - [`restrictions`] - Restriction directives ([`Restrictions`])
//!
//! ## Example: Filtering a Packet
//!
//! ```rust
//! use reprise_core::transform::{self, Pacing, TransformConfig, TransformState, Verdict, ViewerState};
//! use reprise_core::{Message, Restrictions};
//!
//! // Update-health (0x06) only matters to the recording player
//! let raw = [0x06, 0x41, 0xA0, 0x00, 0x00, 0x14, 0x40, 0xA0, 0x00, 0x00];
//! let message = Message::decode(&raw).unwrap();
//!
//! let verdict = transform::apply(
//!     &message,
//!     &mut TransformState::new(),
//!     &ViewerState::default(),
//!     &mut Restrictions::new(),
//!     Pacing::Sync,
//!     &TransformConfig::default(),
//! );
//! assert!(matches!(verdict, Verdict::Drop(_)));
//! ```

pub mod error;
pub mod protocol;
pub mod restrictions;
pub mod transform;

// Re-export commonly used types
pub use error::DecodeError;
pub use protocol::{Message, PacketKind, Position};
pub use restrictions::{RestrictionHandler, Restrictions, RESTRICTION_CHANNEL};
pub use transform::{DropReason, Pacing, TransformConfig, TransformState, Verdict, ViewerState};
