//! Shutdown signalling.
//!
//! SIGTERM and SIGINT stop the daemon, and so does a `shutdown` request. Both
//! end up flipping the same watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

/// Listens for termination signals and hands out shutdown handles.
pub struct SignalHandler {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Spawns a task that triggers shutdown on SIGTERM or SIGINT.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            info!(signal = name, "Received signal, shutting down");
            let _ = tx.send(true);
        });
    }

    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down");
                let _ = tx.send(true);
            }
        });
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// A cloneable handle for components that stop or check the daemon.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

/// Triggers or awaits shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown was triggered, immediately if it already was.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // An error means every sender is gone, so nothing can trigger anymore.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
