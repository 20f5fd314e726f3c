//! Unix socket client for the plugin daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use calexport_protocol::{Envelope, HEADER_LEN, Request, Response, encode_message, frame_length};

use crate::error::{ClientError, ClientResult};

/// Sends one request per connection and waits for the answer.
#[derive(Debug, Clone)]
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends `request` and returns the daemon's response payload.
    ///
    /// Error responses are returned as `Ok(Response::Error { .. })`; use
    /// [`SocketClient::call`] to turn them into [`ClientError::Plugin`].
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let frame = encode_message(&Envelope::request(&request_id, request))?;

        debug!(
            socket = %self.socket_path.display(),
            request_id = %request_id,
            "Connecting to daemon"
        );

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| ClientError::Timeout("connecting to daemon".into()))?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "failed to connect to {}: {} (is `calexport serve` running?)",
                    self.socket_path.display(),
                    e
                ))
            })?;

        tokio::time::timeout(self.timeout, stream.write_all(&frame))
            .await
            .map_err(|_| ClientError::Timeout("sending request".into()))??;

        let payload = tokio::time::timeout(self.timeout, read_frame(&mut stream))
            .await
            .map_err(|_| ClientError::Timeout("reading response".into()))??;

        let envelope: Envelope<Response> = serde_json::from_slice(&payload)
            .map_err(|e| ClientError::Protocol(format!("failed to decode response: {}", e)))?;

        if envelope.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %envelope.request_id,
                "Response request_id mismatch"
            );
        }

        Ok(envelope.payload)
    }

    /// Like [`SocketClient::send`], but error responses become errors.
    pub async fn call(&self, request: Request) -> ClientResult<Response> {
        match self.send(request).await? {
            Response::Error { error } => Err(ClientError::Plugin(error)),
            response => Ok(response),
        }
    }

    /// Returns true if the daemon answers a ping.
    pub async fn ping(&self) -> bool {
        matches!(self.send(Request::Ping).await, Ok(Response::Pong))
    }
}

async fn read_frame(stream: &mut UnixStream) -> ClientResult<Vec<u8>> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;

    let mut payload = vec![0u8; frame_length(header)?];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}
