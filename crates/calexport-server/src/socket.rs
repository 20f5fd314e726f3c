//! Unix socket listener.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use calexport_protocol::{
    Envelope, HEADER_LEN, PROTOCOL_VERSION, ProtocolError, Request, Response, encode_message,
    frame_length,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Accepts plugin connections on a Unix socket.
///
/// The socket file is removed again when the server is dropped.
pub struct SocketServer {
    config: ServerConfig,
    listener: UnixListener,
    connection_slots: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds the socket described by `config`.
    ///
    /// A leftover socket file is removed when nobody answers on it and
    /// `cleanup_stale_socket` is set; a live one is an error.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if socket_path.exists() {
            let live = UnixStream::connect(socket_path).await.is_ok();
            if live || !config.cleanup_stale_socket {
                return Err(ServerError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            info!(path = %socket_path.display(), "Removing stale socket");
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(path = %socket_path.display(), "Socket server listening");

        let connection_slots = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config,
            listener,
            connection_slots,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Waits for a free connection slot, then for a client.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self
            .connection_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Shutdown)?;

        let (stream, _addr) = self.listener.accept().await?;
        debug!("Accepted connection");

        Ok(Connection {
            stream,
            timeout: self.config.connection_timeout,
            _permit: permit,
        })
    }

    /// Accepts connections forever, spawning `handler` for each one.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    tokio::spawn(handler(connection));
                }
                Err(ServerError::Shutdown) => return Ok(()),
                Err(e) => error!(error = %e, "Failed to accept connection"),
            }
        }
    }

    /// Like [`SocketServer::run`], returning once `shutdown` completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Stopping socket server");
                Ok(())
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let path = &self.config.socket_path;
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed socket file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

/// One client connection. Holds a connection slot until dropped.
pub struct Connection {
    stream: UnixStream,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads the next request. `Ok(None)` means the client hung up between
    /// requests.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        let mut header = [0u8; HEADER_LEN];
        let read = with_timeout(
            self.timeout,
            "read request length",
            self.stream.read_exact(&mut header),
        )
        .await;
        match read {
            Ok(_) => {}
            Err(ServerError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let mut payload = vec![0u8; frame_length(header)?];
        with_timeout(
            self.timeout,
            "read request payload",
            self.stream.read_exact(&mut payload),
        )
        .await?;

        let envelope: Envelope<Request> =
            serde_json::from_slice(&payload).map_err(ProtocolError::from)?;

        if !envelope.is_compatible() {
            warn!(
                version = %envelope.protocol_version,
                expected = PROTOCOL_VERSION,
                "Incompatible protocol version"
            );
        }

        Ok(Some(envelope))
    }

    /// Sends `response` tagged with `request_id`.
    pub async fn respond(
        &mut self,
        request_id: impl Into<String>,
        response: Response,
    ) -> ServerResult<()> {
        let frame = encode_message(&Envelope::response(request_id, response))?;
        with_timeout(self.timeout, "write response", self.stream.write_all(&frame)).await
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    operation: &str,
    io: impl Future<Output = std::io::Result<T>>,
) -> ServerResult<T> {
    match tokio::time::timeout(timeout, io).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProtocolError::timeout(operation).into()),
    }
}
