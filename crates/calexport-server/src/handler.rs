//! Request dispatch.
//!
//! Every request is routed onto the shared [`CalendarExportPlugin`]. The
//! plugin sits behind one async mutex, so ledger changes from concurrent
//! connections are applied one at a time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Span, debug, info, warn};

use calexport_core::{LedgerError, Program};
use calexport_protocol::{ErrorCode, HostSettings, Request, Response};

use crate::error::{PluginError, ServerError, ServerResult};
use crate::plugin::{CalendarExportPlugin, Plugin, PluginManager};
use crate::signals::ShutdownHandle;
use crate::socket::Connection;

/// The plugin shared by all connections.
pub type SharedPlugin = Arc<Mutex<CalendarExportPlugin>>;

pub fn new_shared_plugin(plugin: CalendarExportPlugin) -> SharedPlugin {
    Arc::new(Mutex::new(plugin))
}

/// Host seen through the socket.
///
/// The host applies its own unmark when it gets the response to a menu
/// selection, so every unmark request is acknowledged here.
#[derive(Debug, Clone, Copy)]
pub struct RemoteHost {
    settings: HostSettings,
}

impl RemoteHost {
    pub fn new(settings: HostSettings) -> Self {
        Self { settings }
    }
}

impl PluginManager for RemoteHost {
    fn settings(&self) -> HostSettings {
        self.settings
    }

    fn unmark_program(&self, program: &Program) -> bool {
        debug!(program_id = program.id, "Host unmark acknowledged");
        true
    }

    fn unmark_program_with_icon(&self, program: &Program, plugin_id: &str) -> bool {
        debug!(program_id = program.id, plugin_id, "Host unmark acknowledged");
        true
    }
}

/// Maps a plugin failure onto a protocol error code.
pub fn error_code(error: &PluginError) -> ErrorCode {
    match error {
        PluginError::NotActivated { .. } | PluginError::Ledger(LedgerError::NotLoaded { .. }) => {
            ErrorCode::NotActivated
        }
        PluginError::Ledger(LedgerError::Store(_)) => ErrorCode::InternalError,
        PluginError::Preferences(_) => ErrorCode::PreferencesUnavailable,
        PluginError::Launch(_) => ErrorCode::InternalError,
    }
}

fn plugin_response<T>(result: Result<T, PluginError>, ok: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => ok(value),
        Err(e) => {
            warn!(error = %e, "Plugin call failed");
            Response::error(error_code(&e), e.to_string())
        }
    }
}

/// Turns requests into plugin calls.
pub struct RequestHandler {
    plugin: SharedPlugin,
    shutdown: ShutdownHandle,
}

impl RequestHandler {
    pub fn new(plugin: SharedPlugin, shutdown: ShutdownHandle) -> Self {
        Self { plugin, shutdown }
    }

    /// Handles a single request.
    #[tracing::instrument(
        skip(self, request),
        fields(request_type = request_type(request), success = tracing::field::Empty)
    )]
    pub async fn handle(&self, request: &Request) -> Response {
        let start = std::time::Instant::now();

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Shutdown => {
                info!("Shutdown requested by client");
                Response::Ok
            }
            request => {
                let mut plugin = self.plugin.lock().await;
                dispatch(&mut plugin, request)
            }
        };

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            success = response.is_success(),
            "Request handled"
        );
        Span::current().record("success", response.is_success());
        response
    }

    /// Serves requests on `conn` until the client hangs up or asks the
    /// daemon to stop.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        while let Some(envelope) = conn.read_request().await? {
            let response = self.handle(&envelope.payload).await;
            conn.respond(&envelope.request_id, response).await?;

            if matches!(envelope.payload, Request::Shutdown) {
                self.shutdown.trigger();
                return Err(ServerError::Shutdown);
            }
        }

        debug!("Client disconnected");
        Ok(())
    }
}

fn dispatch(plugin: &mut CalendarExportPlugin, request: &Request) -> Response {
    match request {
        Request::Activate { host } => {
            plugin.on_activation(Arc::new(RemoteHost::new(*host)));
            Response::Ok
        }
        Request::Deactivate => {
            plugin.on_deactivation();
            Response::Ok
        }
        Request::GetInfo => Response::info(plugin.info()),
        Request::GetMarkIcon => Response::MarkIcon {
            png: plugin.mark_icon(),
        },
        Request::HasPreferences => Response::HasPreferences {
            has_preferences: plugin.has_preferences(),
        },
        Request::OpenPreferences {
            subscribed_channels,
        } => plugin_response(plugin.open_preferences(subscribed_channels), |()| {
            Response::Ok
        }),
        Request::GetContextMenuActions { program } => {
            plugin_response(plugin.context_menu_actions(program), Response::menu_actions)
        }
        Request::ContextMenuSelected { program, menu } => plugin_response(
            plugin.context_menu_selected(program, menu),
            Response::handled,
        ),
        Request::GetMarkedPrograms => plugin_response(plugin.marked_programs(), |ids| {
            Response::MarkedPrograms { ids }
        }),
        Request::IsMarked { program_id } => {
            plugin_response(plugin.is_marked(*program_id), |marked| Response::Marked {
                marked,
            })
        }
        Request::FirstKnownProgramId { program_id } => plugin_response(
            plugin.handle_first_known_program_id(*program_id),
            |()| Response::Ok,
        ),
        Request::FlushMarkings => plugin_response(plugin.flush_markings(), |()| Response::Ok),
        Request::GetReceiveTargets => Response::ReceiveTargets {
            targets: plugin.receive_targets(),
        },
        Request::ReceivePrograms { programs, target } => {
            Response::handled(plugin.receive_programs(programs, target))
        }
        Request::DeriveDraft { program } => Response::Draft {
            draft: plugin.derive_draft(program),
        },
        Request::Ping => Response::Pong,
        Request::Shutdown => Response::Ok,
    }
}

fn request_type(request: &Request) -> &'static str {
    match request {
        Request::Activate { .. } => "activate",
        Request::Deactivate => "deactivate",
        Request::GetInfo => "get_info",
        Request::GetMarkIcon => "get_mark_icon",
        Request::HasPreferences => "has_preferences",
        Request::OpenPreferences { .. } => "open_preferences",
        Request::GetContextMenuActions { .. } => "get_context_menu_actions",
        Request::ContextMenuSelected { .. } => "context_menu_selected",
        Request::GetMarkedPrograms => "get_marked_programs",
        Request::IsMarked { .. } => "is_marked",
        Request::FirstKnownProgramId { .. } => "first_known_program_id",
        Request::FlushMarkings => "flush_markings",
        Request::GetReceiveTargets => "get_receive_targets",
        Request::ReceivePrograms { .. } => "receive_programs",
        Request::DeriveDraft { .. } => "derive_draft",
        Request::Ping => "ping",
        Request::Shutdown => "shutdown",
    }
}

/// Boxed per-connection future.
pub type ConnectionFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Builds the closure [`crate::SocketServer::run`] spawns per connection.
pub fn make_connection_handler(
    plugin: SharedPlugin,
    shutdown: ShutdownHandle,
) -> impl Fn(Connection) -> ConnectionFuture + Send + Sync + 'static {
    move |conn| {
        let handler = RequestHandler::new(plugin.clone(), shutdown.clone());
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                warn!(error = %e, "Connection handler error");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calexport_core::{Channel, EventDraft, MemoryStore, StoreError};
    use calexport_protocol::PluginMenu;
    use chrono::{Duration, Utc};

    use crate::error::{LaunchError, PreferencesError};
    use crate::launcher::CalendarLauncher;
    use crate::plugin::{EXPORT_MENU_ID, UNMARK_MENU_ID};
    use crate::preferences::PreferencesSurface;
    use crate::signals::SignalHandler;

    struct AcceptingLauncher;

    impl CalendarLauncher for AcceptingLauncher {
        fn is_available(&self) -> bool {
            true
        }

        fn launch(&self, _draft: &EventDraft) -> Result<(), LaunchError> {
            Ok(())
        }
    }

    struct BrokenPreferences;

    impl PreferencesSurface for BrokenPreferences {
        fn open(&self, _dark_theme: bool) -> Result<(), PreferencesError> {
            Err(PreferencesError::Open(std::io::Error::other("no editor")))
        }
    }

    fn handler() -> (RequestHandler, SignalHandler) {
        let plugin = CalendarExportPlugin::new(
            Arc::new(MemoryStore::new()),
            Arc::new(AcceptingLauncher),
            Arc::new(BrokenPreferences),
        );
        let signals = SignalHandler::new();
        let handler = RequestHandler::new(new_shared_plugin(plugin), signals.shutdown_handle());
        (handler, signals)
    }

    fn program(id: i64) -> Program {
        let start = Utc::now() + Duration::hours(1);
        Program::new(id, "Film", Channel::new(2, "Ch2"), start, start + Duration::hours(2))
    }

    async fn activate(handler: &RequestHandler, version_code: u32) {
        let response = handler
            .handle(&Request::activate(HostSettings::new(false, version_code)))
            .await;
        assert_eq!(response, Response::Ok);
    }

    #[tokio::test]
    async fn ping_and_static_requests() {
        let (handler, _signals) = handler();
        assert_eq!(handler.handle(&Request::Ping).await, Response::Pong);
        assert_eq!(
            handler.handle(&Request::HasPreferences).await,
            Response::HasPreferences {
                has_preferences: true
            }
        );
        assert_eq!(
            handler.handle(&Request::GetReceiveTargets).await,
            Response::ReceiveTargets { targets: vec![] }
        );
        assert!(matches!(
            handler.handle(&Request::GetInfo).await,
            Response::Info { .. }
        ));
    }

    #[tokio::test]
    async fn ledger_requests_before_activation_fail() {
        let (handler, _signals) = handler();
        let response = handler.handle(&Request::is_marked(1)).await;
        assert_eq!(
            response.as_error().map(|e| e.code),
            Some(ErrorCode::NotActivated)
        );
    }

    #[tokio::test]
    async fn export_then_unmark_flow() {
        let (handler, _signals) = handler();
        activate(&handler, 308).await;

        let response = handler
            .handle(&Request::context_menu_actions(program(10)))
            .await;
        let Response::MenuActions { actions } = response else {
            panic!("unexpected response: {response:?}");
        };
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, EXPORT_MENU_ID);

        let export = Request::context_menu_selected(program(10), actions[0].clone());
        assert_eq!(handler.handle(&export).await, Response::handled(true));
        assert_eq!(
            handler.handle(&Request::is_marked(10)).await,
            Response::Marked { marked: true }
        );

        let unmark =
            Request::context_menu_selected(program(10), PluginMenu::new(UNMARK_MENU_ID, "x"));
        assert_eq!(handler.handle(&unmark).await, Response::handled(false));
        assert_eq!(
            handler.handle(&Request::GetMarkedPrograms).await,
            Response::MarkedPrograms { ids: vec![] }
        );
    }

    #[tokio::test]
    async fn first_known_program_id_prunes_ledger() {
        let (handler, _signals) = handler();
        activate(&handler, 300).await;

        for id in [1, 2, 3] {
            let request =
                Request::context_menu_selected(program(id), PluginMenu::new(EXPORT_MENU_ID, "x"));
            handler.handle(&request).await;
        }

        assert_eq!(
            handler.handle(&Request::first_known_program_id(3)).await,
            Response::Ok
        );
        assert_eq!(
            handler.handle(&Request::GetMarkedPrograms).await,
            Response::MarkedPrograms { ids: vec![3] }
        );
    }

    #[tokio::test]
    async fn flush_markings_needs_activation() {
        let (handler, _signals) = handler();
        let response = handler.handle(&Request::FlushMarkings).await;
        assert_eq!(
            response.as_error().map(|e| e.code),
            Some(ErrorCode::NotActivated)
        );

        activate(&handler, 308).await;
        assert_eq!(handler.handle(&Request::FlushMarkings).await, Response::Ok);
    }

    #[test]
    fn plugin_errors_map_to_codes() {
        assert_eq!(
            error_code(&PluginError::not_activated("unmark")),
            ErrorCode::NotActivated
        );
        assert_eq!(
            error_code(&LedgerError::not_loaded("mark").into()),
            ErrorCode::NotActivated
        );
        assert_eq!(
            error_code(&LedgerError::from(StoreError::Poisoned).into()),
            ErrorCode::InternalError
        );
    }

    #[tokio::test]
    async fn derive_draft_previews_without_marking() {
        let (handler, _signals) = handler();
        activate(&handler, 308).await;

        let response = handler.handle(&Request::derive_draft(program(4))).await;
        let Response::Draft { draft } = response else {
            panic!("unexpected response: {response:?}");
        };
        assert_eq!(draft.title, "Film");
        assert_eq!(draft.location.as_deref(), Some("Ch2"));
        assert_eq!(
            handler.handle(&Request::is_marked(4)).await,
            Response::Marked { marked: false }
        );
    }

    #[tokio::test]
    async fn preferences_failure_maps_to_error_code() {
        let (handler, _signals) = handler();
        let response = handler
            .handle(&Request::OpenPreferences {
                subscribed_channels: vec![],
            })
            .await;
        assert_eq!(
            response.as_error().map(|e| e.code),
            Some(ErrorCode::PreferencesUnavailable)
        );
    }

    #[tokio::test]
    async fn deactivate_unloads_ledger() {
        let (handler, _signals) = handler();
        activate(&handler, 308).await;
        assert_eq!(handler.handle(&Request::Deactivate).await, Response::Ok);

        let response = handler.handle(&Request::GetMarkedPrograms).await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn shutdown_request_answers_ok() {
        let (handler, signals) = handler();
        assert_eq!(handler.handle(&Request::Shutdown).await, Response::Ok);
        // Only a served connection triggers the shutdown handle.
        assert!(!signals.is_shutdown());
    }

    #[test]
    fn remote_host_acknowledges_unmarks() {
        let host = RemoteHost::new(HostSettings::new(true, 400));
        assert!(host.settings().dark_theme);
        assert!(host.unmark_program(&program(1)));
        assert!(host.unmark_program_with_icon(&program(1), "calexport"));
    }
}
