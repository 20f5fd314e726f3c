//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Settings for the plugin daemon.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// Per read/write timeout on a connection.
    pub connection_timeout: Duration,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Remove a socket file left behind by a dead daemon.
    pub cleanup_stale_socket: bool,

    /// JSON file backing preferences and markings.
    pub store_path: PathBuf,

    /// Directory calendar files are written to.
    pub outbox_dir: PathBuf,

    /// Open written calendar files with the desktop's default handler.
    pub open_with_default_app: bool,

    /// PNG shown by the host next to marked programs.
    pub mark_icon: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(30),
            max_connections: 16,
            cleanup_stale_socket: true,
            store_path: data_dir.join("store.json"),
            outbox_dir: data_dir.join("outbox"),
            open_with_default_app: true,
            mark_icon: None,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration listening on `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_outbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outbox_dir = dir.into();
        self
    }

    pub fn with_open_with_default_app(mut self, open: bool) -> Self {
        self.open_with_default_app = open;
        self
    }

    pub fn with_mark_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.mark_icon = icon;
        self
    }
}

/// Returns the default socket path.
///
/// `$XDG_RUNTIME_DIR/calexport.sock`, or `/tmp/calexport-$UID.sock` when the
/// runtime directory is unset.
pub fn default_socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(runtime_dir) => PathBuf::from(runtime_dir).join("calexport.sock"),
        None => PathBuf::from(format!("/tmp/calexport-{}.sock", current_uid())),
    }
}

/// Returns the default data directory: `$XDG_DATA_HOME/calexport`, then
/// `$HOME/.local/share/calexport`, then a per-user directory under `/tmp`.
pub fn default_data_dir() -> PathBuf {
    if let Some(data_home) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join("calexport");
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local/share/calexport");
    }
    PathBuf::from(format!("/tmp/calexport-{}", current_uid()))
}

#[cfg(unix)]
fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}
