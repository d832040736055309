//! Length-delimited frame codec. Pure byte-slinging, no I/O, no state beyond
//! the buffer it is handed.
//!
//! Wire layout: 2-byte big-endian message type, 4-byte big-endian body
//! length, then that many opaque body bytes. Total frame size is
//! `HEADER_SIZE + body.len()`.

/// Opaque message-type tag. The core assigns no meaning to any value.
pub type MsgType = u16;

/// Header size in bytes: 2-byte type + 4-byte length.
pub const HEADER_SIZE: usize = 6;

/// Design default for the maximum body length a single frame may declare.
pub const DEFAULT_MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;

/// Result of attempting to extract one frame from the head of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A full header and body were present; both were removed from `buf`.
    Ready { msg_type: MsgType, body: Vec<u8> },
    /// Fewer than `HEADER_SIZE` bytes, or header present but body
    /// incomplete. `buf` is left unchanged.
    Incomplete,
    /// The declared body length exceeds `max_body_size`. The connection
    /// owning `buf` must be closed; `buf` is left unchanged.
    Malformed,
}

/// Attempt to decode one frame from the head of `buf`.
///
/// On `Ready`, the header and body bytes are drained from `buf` so a
/// second call can extract the next frame, if any. Never allocates beyond
/// the returned body, never blocks.
pub fn decode(buf: &mut Vec<u8>, max_body_size: u32) -> DecodeOutcome {
    if buf.len() < HEADER_SIZE {
        return DecodeOutcome::Incomplete;
    }

    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    let body_len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);

    if body_len > max_body_size {
        return DecodeOutcome::Malformed;
    }

    let total = HEADER_SIZE + body_len as usize;
    if buf.len() < total {
        return DecodeOutcome::Incomplete;
    }

    let body = buf[HEADER_SIZE..total].to_vec();
    buf.drain(..total);
    DecodeOutcome::Ready { msg_type, body }
}

/// Serialize `(msg_type, body)` into a standalone frame: 6-byte header
/// followed by `body`. No escaping, no trailer.
pub fn encode(msg_type: MsgType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&msg_type.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}
