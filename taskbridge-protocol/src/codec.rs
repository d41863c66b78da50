//! Encoder and decoder for taskbridge frames and messages.

use crate::error::ProtocolError;
use crate::frame::{encode_frame, FrameDecoder};
use crate::message::{Request, Response};
use bytes::{Bytes, BytesMut};

/// Encodes requests and responses into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a frame.
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        Self::encode_json(request)
    }

    /// Encodes a response into a frame.
    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        Self::encode_json(response)
    }

    /// Encodes any JSON-serializable value into a frame.
    pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<BytesMut, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        encode_frame(&payload)
    }
}

/// Decodes frames into requests and responses.
///
/// Empty frames are skipped. A payload that fails to parse is consumed and
/// reported as an error; decoding can resume with the next call.
pub struct Decoder {
    frames: FrameDecoder,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            frames: FrameDecoder::new(),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.frames.extend(data);
    }

    /// Returns the next non-empty frame payload.
    pub fn decode_frame(&mut self) -> Option<Bytes> {
        while let Some(frame) = self.frames.decode_frame() {
            if !frame.is_empty() {
                return Some(frame);
            }
        }
        None
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        match self.decode_frame() {
            Some(payload) => Request::parse(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        match self.decode_frame() {
            Some(payload) => {
                let payload =
                    std::str::from_utf8(&payload).map_err(|_| ProtocolError::InvalidUtf8)?;
                let response: Response = serde_json::from_str(payload)?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.frames.buffered()
    }

    /// Ends the stream and returns the unterminated remainder.
    pub fn finish(self) -> Bytes {
        self.frames.finish()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
