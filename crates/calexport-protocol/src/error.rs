//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing or parsing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame length above [`crate::MAX_MESSAGE_SIZE`].
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: u32 },

    /// Frame with a zero length prefix.
    #[error("empty message")]
    EmptyMessage,

    /// Fewer bytes than the frame announced.
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Read or write did not finish in time.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}
