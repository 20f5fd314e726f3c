//! Server error types.

use std::io;
use std::path::PathBuf;

use calexport_core::{LedgerError, StoreError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Result type for calendar launches.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors raised by the socket server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Framing or encoding failure.
    #[error("Protocol error: {0}")]
    Protocol(#[from] calexport_protocol::ProtocolError),

    /// Another daemon is listening on the socket.
    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    /// Socket path parent directory does not exist.
    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    /// Store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A client asked the daemon to stop.
    #[error("Server shutdown requested")]
    Shutdown,
}

impl ServerError {
    /// Creates a socket in use error.
    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    /// Creates a socket path invalid error.
    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }
}

/// Errors raised while handing a draft to the calendar.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Outbox directory missing and not creatable.
    #[error("calendar outbox unavailable: {}", path.display())]
    Unavailable { path: PathBuf },

    #[error("failed to write calendar file: {0}")]
    Io(#[from] io::Error),

    /// The desktop handler refused the file.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised when opening the preferences surface.
#[derive(Debug, Error)]
pub enum PreferencesError {
    /// Nothing to open.
    #[error("preferences file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to open preferences: {0}")]
    Open(#[from] io::Error),
}

/// Errors surfaced by [`crate::Plugin`] methods.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A host callback was needed before `on_activation`.
    #[error("plugin is not activated (attempted {operation})")]
    NotActivated { operation: &'static str },

    /// Ledger used before activation, or an explicit flush failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),
}

impl PluginError {
    /// Creates a not-activated error for the named operation.
    pub fn not_activated(operation: &'static str) -> Self {
        Self::NotActivated { operation }
    }
}
