//! Minimal WebSocket frame codec.
//!
//! Single-frame text messages only: server frames unmasked, client frames
//! masked, payload length as a 7-bit, 16-bit, or 64-bit prefix chosen by
//! size. Close frames are recognized so a read loop can exit cleanly;
//! fragmentation and ping/pong control frames are out of scope.
//!
//! Pure byte-level functions with no I/O, so the framing rules can be
//! checked against fixed vectors.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;

const OPCODE_TEXT: u8 = 0x1;
const OPCODE_CLOSE: u8 = 0x8;

/// A decoded single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text message
    Text(String),
    /// A close frame; any status payload is ignored
    Close,
}

/// Frame decoding errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unsupported frame: {0}")]
    Unsupported(&'static str),
    #[error("unknown opcode: {0:#x}")]
    UnknownOpcode(u8),
    #[error("text frame payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("frame payload too large for this platform")]
    TooLarge,
}

/// Encode a server-to-client text frame (unmasked, single frame)
pub fn encode_text_frame(payload: &str) -> Bytes {
    let data = payload.as_bytes();
    let mut buf = BytesMut::with_capacity(data.len() + 10);
    buf.put_u8(FIN_BIT | OPCODE_TEXT);
    match data.len() {
        len if len < 126 => buf.put_u8(len as u8),
        len if len <= u16::MAX as usize => {
            buf.put_u8(126);
            buf.put_u16(len as u16);
        }
        len => {
            buf.put_u8(127);
            buf.put_u64(len as u64);
        }
    }
    buf.put_slice(data);
    buf.freeze()
}

/// Encode a server close frame with no status payload
pub fn encode_close_frame() -> Bytes {
    Bytes::from_static(&[FIN_BIT | OPCODE_CLOSE, 0x00])
}

/// Attempt to decode one frame from the front of `buf`.
///
/// Returns the frame plus the number of bytes consumed, or `Ok(None)` when
/// more bytes are needed.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let first = buf[0];
    if first & FIN_BIT == 0 || first & RSV_BITS != 0 {
        return Err(FrameError::Unsupported("fragmented or reserved-bit frame"));
    }
    let opcode = first & 0x0F;

    let second = buf[1];
    let masked = second & MASK_BIT != 0;
    let mut len = u64::from(second & 0x7F);
    let mut offset = 2usize;
    if len == 126 {
        if buf.len() < offset + 2 {
            return Ok(None);
        }
        len = u64::from(u16::from_be_bytes([buf[2], buf[3]]));
        offset += 2;
    } else if len == 127 {
        if buf.len() < offset + 8 {
            return Ok(None);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[2..10]);
        len = u64::from_be_bytes(bytes);
        offset += 8;
    }

    let mask_key = if masked {
        if buf.len() < offset + 4 {
            return Ok(None);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    let len = usize::try_from(len).map_err(|_| FrameError::TooLarge)?;
    if buf.len() < offset + len {
        return Ok(None);
    }
    let mut payload = buf[offset..offset + len].to_vec();
    if let Some(key) = mask_key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }
    let consumed = offset + len;

    match opcode {
        OPCODE_TEXT => {
            let text = String::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;
            Ok(Some((Frame::Text(text), consumed)))
        }
        OPCODE_CLOSE => Ok(Some((Frame::Close, consumed))),
        other => Err(FrameError::UnknownOpcode(other)),
    }
}
