//! Message encoding and decoding for the peer transport.
//!
//! # Wire Format
//!
//! ```text
//! {"type":"CREDIT","src_node_id":1,"dst_node_id":3,"amount":30000}\n
//! ```
//!
//! One JSON object per line. The `type` field selects the message kind.

use snapline_messages::PeerMessage;
use thiserror::Error;

/// Default upper bound for one frame, newline excluded.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Empty frame")]
    Empty,

    #[error("Frame of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    /// Not valid JSON at all.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// Valid JSON that is not a peer message.
    #[error("Invalid message shape: {0}")]
    InvalidShape(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

/// Encode a message as one newline-terminated frame.
pub fn encode_message(message: &PeerMessage) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode one frame (trailing newline and surrounding whitespace allowed).
pub fn decode_message(frame: &[u8], max_frame_size: usize) -> Result<PeerMessage, CodecError> {
    if frame.len() > max_frame_size {
        return Err(CodecError::TooLarge {
            size: frame.len(),
            limit: max_frame_size,
        });
    }
    if frame.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }

    serde_json::from_slice(frame).map_err(|e| {
        if e.is_syntax() || e.is_eof() || e.is_io() {
            CodecError::Malformed(e.to_string())
        } else {
            CodecError::InvalidShape(e.to_string())
        }
    })
}
