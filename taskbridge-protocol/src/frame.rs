//! NUL-delimited framing.
//!
//! Frame layout:
//!
//! ```text
//! +-----------------------+------+-----------------------+------+
//! | payload (UTF-8 JSON)  | 0x00 | payload (UTF-8 JSON)  | 0x00 | ...
//! +-----------------------+------+-----------------------+------+
//! ```
//!
//! There is no length prefix and no escaping. Payloads must not contain the
//! delimiter byte; `serde_json` output never does, since it escapes U+0000.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Sentinel byte terminating every frame.
pub const DELIMITER: u8 = b'\0';

/// Default initial capacity of the pending buffer.
const DEFAULT_BUFFER_CAPACITY: usize = 8192;

/// Splits an incoming byte stream into frames.
///
/// The decoder owns the pending buffer: bytes that arrived but are not yet
/// followed by a delimiter. Each instance is independent.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            scanned: 0,
        }
    }

    /// Appends `chunk` and returns an iterator over every frame now complete.
    ///
    /// The iterator is lazy: each call to `next` removes one frame (and its
    /// delimiter) from the front of the buffer. Frames not pulled from the
    /// iterator stay buffered and are returned by later calls. Empty frames
    /// are yielded as-is; callers decide whether to skip them.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buffer.extend_from_slice(chunk);
        Frames { decoder: self }
    }

    /// Appends data to the pending buffer without draining it.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete frame, if any.
    pub fn decode_frame(&mut self) -> Option<Bytes> {
        // Only bytes appended since the last miss are searched, so a large
        // frame arriving in small reads is scanned once overall.
        match self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        {
            Some(offset) => {
                let frame = self.buffer.split_to(self.scanned + offset).freeze();
                self.buffer.advance(1);
                self.scanned = 0;
                Some(frame)
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Returns the number of bytes waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Ends the stream, returning the unterminated remainder.
    ///
    /// The remainder is never parsed; it is handed back only so the caller
    /// can report how much was dropped.
    pub fn finish(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Clears the pending buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy sequence of complete frames, returned by [`FrameDecoder::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.decoder.decode_frame()
    }
}

/// Encodes a payload as one frame: the payload followed by a single delimiter.
pub fn encode_frame(payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    if payload.contains(&DELIMITER) {
        return Err(ProtocolError::DelimiterInPayload);
    }
    let mut buf = BytesMut::with_capacity(payload.len() + 1);
    buf.put_slice(payload);
    buf.put_u8(DELIMITER);
    Ok(buf)
}
