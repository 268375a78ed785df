//! Error types for packet decoding

use thiserror::Error;

/// Errors that can occur when decoding a recorded packet
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Packet is too short to contain the field being read
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Payload contained no packet id at all
    #[error("Empty packet")]
    Empty,

    /// VarInt ran past five bytes
    #[error("VarInt too long")]
    VarIntTooLong,

    /// Packet id is not part of the clientbound play protocol
    #[error("Unknown packet id: {0:#04X}")]
    UnknownPacketId(i32),

    /// A length prefix was negative
    #[error("Negative length prefix: {0}")]
    NegativeLength(i32),

    /// Invalid UTF-8 in string field
    #[error("Invalid string encoding")]
    InvalidString,
}
