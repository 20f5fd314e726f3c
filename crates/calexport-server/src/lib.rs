//! Plugin daemon for the calendar export plugin.
//!
//! - [`CalendarExportPlugin`] implements the host's [`Plugin`] method set
//! - [`IcsLauncher`] writes exported events as iCalendar files
//! - [`SocketServer`] and [`RequestHandler`] expose the plugin over a Unix socket
//!
//! ```rust,no_run
//! use calexport_server::{
//!     CalendarExportPlugin, ServerConfig, SignalHandler, SocketServer,
//!     make_connection_handler, new_shared_plugin,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let plugin = new_shared_plugin(CalendarExportPlugin::from_config(&config)?);
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     let shutdown = signals.shutdown_handle();
//!
//!     let server = SocketServer::bind(config).await?;
//!     let handler = make_connection_handler(plugin, shutdown.clone());
//!     server.run_until_shutdown(handler, async move { shutdown.wait().await }).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod launcher;
mod plugin;
mod preferences;
mod signals;
mod socket;

pub use config::{ServerConfig, default_data_dir, default_socket_path};
pub use error::{
    LaunchError, LaunchResult, PluginError, PluginResult, PreferencesError, ServerError,
    ServerResult,
};
pub use handler::{
    ConnectionFuture, RemoteHost, RequestHandler, SharedPlugin, error_code,
    make_connection_handler, new_shared_plugin,
};
pub use launcher::{CalendarLauncher, IcsLauncher, render_ics};
pub use plugin::{
    CalendarExportPlugin, EXPORT_MENU_ID, PLUGIN_ID, Plugin, PluginManager, UNMARK_MENU_ID,
};
pub use preferences::{FilePreferencesSurface, PreferencesSurface};
pub use signals::{ShutdownHandle, SignalHandler};
pub use socket::{Connection, SocketServer};
