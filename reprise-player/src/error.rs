//! Error types for replay playback

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header promised more payload bytes than the log contains
    #[error("Truncated frame at {timestamp_ms}ms: expected {expected} bytes, got {actual}")]
    TruncatedFrame {
        timestamp_ms: u32,
        expected: usize,
        actual: usize,
    },

    /// Log ended partway through a frame header
    #[error("Truncated frame header: got {actual} of 8 bytes")]
    TruncatedHeader { actual: usize },

    #[error("Corrupt frame header: {0}")]
    CorruptFrame(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The recording requires a restriction this player does not know
    #[error("Unknown replay restriction: {0}")]
    UnknownRestriction(String),

    #[error("Cannot jump in sync mode")]
    JumpInSyncMode,

    #[error("Cannot play until a timestamp in async mode")]
    PlayUntilInAsyncMode,

    #[error("Replay has been terminated")]
    Terminated,
}

impl ReplayError {
    /// True for errors after which nothing more can be read from the log
    pub fn is_end_of_log(&self) -> bool {
        match self {
            ReplayError::TruncatedFrame { .. }
            | ReplayError::TruncatedHeader { .. }
            | ReplayError::CorruptFrame(_) => true,
            ReplayError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
