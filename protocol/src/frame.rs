//! Message framing.
//!
//! Each message is prefixed with a 5-byte header:
//! - 1 byte: flags (reserved, must be 0)
//! - 4 bytes: message length (big-endian u32)
//!
//! followed by the message payload. The framing layer knows nothing
//! about the payload encoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame header (1 flag byte + 4 length bytes).
pub const HEADER_SIZE: usize = 5;

/// Maximum message size (4 MiB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Framing protocol error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    /// The length prefix exceeds [`MAX_MESSAGE_SIZE`].
    #[error("message too large: {0} bytes")]
    TooLarge(usize),
    /// The flag byte carried an unknown value.
    #[error("unsupported frame flags: {0:#04x}")]
    BadFlags(u8),
}

/// Encode a message into a frame, header included.
pub fn encode_frame(message: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + message.len());
    buf.put_u8(0);
    buf.put_u32(message.len() as u32);
    buf.put_slice(message);
    buf.freeze()
}

/// Try to decode one frame from the front of `buf`.
///
/// Returns `Ok(Some(payload))` when a complete frame was consumed,
/// `Ok(None)` when more data is needed.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }

    // Peek at the header without consuming it.
    let flags = buf[0];
    if flags != 0 {
        return Err(FrameError::BadFlags(flags));
    }
    let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if length > MAX_MESSAGE_SIZE {
        return Err(FrameError::TooLarge(length));
    }
    if buf.len() < HEADER_SIZE + length {
        return Ok(None);
    }

    buf.advance(HEADER_SIZE);
    Ok(Some(buf.split_to(length).freeze()))
}

/// Stateful decoder accumulating stream input until frames complete.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append stream data to the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete frame.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        decode_frame(&mut self.buffer)
    }

    /// Bytes buffered but not yet decoded.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
