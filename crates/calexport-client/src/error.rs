//! Client error types.

use std::fmt;

use calexport_protocol::ErrorResponse;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration file unreadable or invalid.
    Config(String),
    Io(std::io::Error),
    /// Could not reach the daemon.
    Connection(String),
    /// Framing or decoding failure.
    Protocol(String),
    Timeout(String),
    /// The daemon answered with an error response.
    Plugin(ErrorResponse),
    /// The daemon answered with a response of the wrong kind.
    UnexpectedResponse(String),
    /// A program file could not be read.
    Input(String),
    /// Preference store failure.
    Store(String),
    /// The daemon failed to start or stopped with an error.
    Server(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
            Self::Plugin(err) => write!(f, "plugin error: {}", err),
            Self::UnexpectedResponse(msg) => write!(f, "unexpected response: {}", msg),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Store(msg) => write!(f, "store error: {}", msg),
            Self::Server(msg) => write!(f, "server error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Plugin(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<calexport_protocol::ProtocolError> for ClientError {
    fn from(err: calexport_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<calexport_core::StoreError> for ClientError {
    fn from(err: calexport_core::StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<calexport_server::ServerError> for ClientError {
    fn from(err: calexport_server::ServerError) -> Self {
        Self::Server(err.to_string())
    }
}
