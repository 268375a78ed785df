//! Recorded protocol decoding.
//!
//! This module contains the wire primitives and the typed message model for
//! the clientbound play-state packets found in a recording. All functions are
//! pure (no I/O).
//!
//! # Structure
//!
//! - [`PacketReader`] / [`PacketWriter`] - VarInts, big-endian scalars and
//!   length-prefixed strings
//! - [`packets`] - the closed table of packet ids ([`PacketKind`])
//! - [`message`] - the decoded [`Message`] union with `decode`/`encode`
//!
//! # Example
//!
//! ```rust
//! use reprise_core::protocol::{Message, PacketKind};
//!
//! // Change-game-state: id 0x2B, reason 2 (begin rain), value 0.0
//! let raw = [0x2B, 0x02, 0x00, 0x00, 0x00, 0x00];
//! let message = Message::decode(&raw).unwrap();
//! assert_eq!(message.kind(), PacketKind::ChangeGameState);
//! assert_eq!(message.encode(), raw);
//! ```

pub mod message;
pub mod packets;

pub use message::{
    AttachEntity, ChangeGameState, Chat, CollectItem, CustomPayload, DestroyEntities, Disconnect,
    EntityMessage, JoinGame, Message, Position, PositionLook, ResourcePackSend, Respawn,
};
pub use packets::PacketKind;

use crate::error::DecodeError;

/// Longest VarInt the protocol allows
pub const MAX_VARINT_LEN: usize = 5;

/// Cursor over the body of a single packet
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::TooShort {
                expected: self.pos + len,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Read a protocol VarInt (7 bits per byte, little-endian groups)
    pub fn read_varint(&mut self) -> Result<i32, DecodeError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(DecodeError::VarIntTooLong)
    }

    /// Read a VarInt length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(DecodeError::NegativeLength(len));
        }
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidString)
    }

    /// Consume everything that is left
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

/// Builder for the body of a single packet
#[derive(Debug, Clone, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a packet with its id
    pub fn with_id(id: i32) -> Self {
        let mut writer = Self::new();
        writer.write_varint(id);
        writer
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.write_u8(value as u8)
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(value as u8)
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_varint(&mut self, value: i32) -> &mut Self {
        let mut value = value as u32;
        loop {
            if value & !0x7F == 0 {
                self.buf.push(value as u8);
                return self;
            }
            self.buf.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
    }

    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_varint(value.len() as i32);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
