//! Serve command: runs the plugin daemon in the foreground.

use std::sync::Arc;

use tracing::info;

use calexport_server::{
    CalendarExportPlugin, Plugin, RemoteHost, SignalHandler, SocketServer,
    make_connection_handler, new_shared_plugin,
};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Activates the plugin and answers socket requests until SIGTERM, SIGINT
/// or a `stop` request.
pub async fn run(config: &ClientConfig) -> ClientResult<()> {
    let server_config = config.server_config();

    let mut plugin = CalendarExportPlugin::from_config(&server_config)?;
    plugin.on_activation(Arc::new(RemoteHost::new(config.host_settings())));
    let plugin = new_shared_plugin(plugin);

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();
    let shutdown = signal_handler.shutdown_handle();

    let server = SocketServer::bind(server_config).await?;
    info!(
        socket = %server.socket_path().display(),
        store = %config.store_path().display(),
        "Daemon ready"
    );

    let waiter = shutdown.clone();
    let result = server
        .run_until_shutdown(
            make_connection_handler(plugin.clone(), shutdown),
            async move { waiter.wait().await },
        )
        .await;
    drop(server);

    plugin.lock().await.on_deactivation();
    info!("Daemon stopped");

    result.map_err(Into::into)
}
