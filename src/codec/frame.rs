//! Newline-delimited framing.
//!
//! Outbound payloads get exactly one terminator appended. Inbound bytes are
//! accumulated until a terminator shows up, so lines split across transport
//! packets come out whole.

use crate::core::constants::FRAME_TERMINATOR;

/// Append the frame terminator to `payload`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(FRAME_TERMINATOR);
    frame
}

/// Reassembles newline-terminated lines from a byte stream.
///
/// The accumulator is unbounded; the peer is trusted.
#[derive(Debug, Default, Clone)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delivery and return every line it completed, in order.
    ///
    /// Terminators and a trailing carriage return are stripped. Splitting
    /// happens on bytes, so a UTF-8 sequence cut by a packet boundary is
    /// reassembled before decoding.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == FRAME_TERMINATOR) {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Bytes waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
