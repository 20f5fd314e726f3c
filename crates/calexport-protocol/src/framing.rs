//! Length-prefixed message framing.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! Only the byte layout lives here. Async readers in the daemon and the CLI
//! read the 4-byte header, validate it with [`frame_length`] and then read
//! exactly that many payload bytes.

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Validates a length prefix and returns the payload size it announces.
pub fn frame_length(header: [u8; HEADER_LEN]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if len > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

/// Serializes `message` and prepends its length.
///
/// ```rust
/// use calexport_protocol::{Envelope, Request, encode_message};
///
/// let bytes = encode_message(&Envelope::request("req-1", Request::Ping)).unwrap();
/// assert!(bytes.len() > 4);
/// ```
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    if json.len() > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + json.len());
    frame.extend_from_slice(&(json.len() as u32).to_be_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Parses one complete frame. Trailing bytes after the payload are ignored.
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some((header, rest)) = data.split_first_chunk::<HEADER_LEN>() else {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN,
            received: data.len(),
        });
    };

    let len = frame_length(*header)?;
    let Some(payload) = rest.get(..len) else {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN + len,
            received: data.len(),
        });
    };

    Ok(serde_json::from_slice(payload)?)
}
