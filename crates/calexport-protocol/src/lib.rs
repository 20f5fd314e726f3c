//! Wire protocol between a TV-guide host and the calendar export plugin
//! daemon.
//!
//! Messages travel over a Unix socket as length-prefixed JSON: a 4-byte
//! big-endian length followed by the payload. Every payload is wrapped in an
//! [`Envelope`] carrying `protocol_version` and a `request_id` so responses
//! can be matched to requests.
//!
//! ```rust
//! use calexport_protocol::{Envelope, Request, decode_message, encode_message};
//!
//! let request = Envelope::request("req-123", Request::GetMarkedPrograms);
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{HEADER_LEN, decode_message, encode_message, frame_length};
pub use types::{
    Envelope, ErrorCode, ErrorResponse, HostSettings, PluginInfo, PluginMenu, ReceiveTarget,
    Request, Response,
};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum payload size (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
