//! Packet log (`.tmcpr`) frame format.
//!
//! A log is a plain sequence of frames with no file header or index:
//! big-endian `i32` timestamp, big-endian `i32` payload length, payload.

use std::io::{self, ErrorKind, Read, Write};

use crate::error::ReplayError;

/// Frame header size in bytes (timestamp + length)
pub const FRAME_HEADER_SIZE: usize = 8;

/// One timestamped record of the packet log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Milliseconds since the start of the recording
    pub timestamp_ms: u32,
    /// One full packet: VarInt id followed by its body
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(timestamp_ms: u32, payload: Vec<u8>) -> Self {
        Self {
            timestamp_ms,
            payload,
        }
    }

    /// Write frame to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let timestamp = i32::try_from(self.timestamp_ms)
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "timestamp out of range"))?;
        let len = i32::try_from(self.payload.len())
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "payload too large"))?;

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[0..4].copy_from_slice(&timestamp.to_be_bytes());
        header[4..8].copy_from_slice(&len.to_be_bytes());
        writer.write_all(&header)?;
        writer.write_all(&self.payload)
    }
}

/// Sequential reader over a packet log
pub struct PacketLogReader<R: Read> {
    reader: R,
    frames_read: u64,
}

impl<R: Read> PacketLogReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frames_read: 0,
        }
    }

    /// Number of frames returned so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, `None` at a clean end of log
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ReplayError> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < FRAME_HEADER_SIZE {
            return Err(ReplayError::TruncatedHeader { actual: got });
        }

        let timestamp = i32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let len = i32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if timestamp < 0 {
            return Err(ReplayError::CorruptFrame(format!(
                "negative timestamp {}",
                timestamp
            )));
        }
        if len < 0 {
            return Err(ReplayError::CorruptFrame(format!(
                "negative length {} at {}ms",
                len, timestamp
            )));
        }

        let timestamp_ms = timestamp as u32;
        // Grows with the data actually present, not the claimed length
        let expected = len as usize;
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(len as u64)
            .read_to_end(&mut payload)?;
        if payload.len() < expected {
            return Err(ReplayError::TruncatedFrame {
                timestamp_ms,
                expected,
                actual: payload.len(),
            });
        }

        self.frames_read += 1;
        Ok(Some(Frame {
            timestamp_ms,
            payload,
        }))
    }
}

/// Like `read_exact`, but reports how much was read before end of input
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encode a list of frames into a complete log
pub fn encode_log(frames: &[Frame]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for frame in frames {
        frame.write(&mut buf)?;
    }
    Ok(buf)
}
