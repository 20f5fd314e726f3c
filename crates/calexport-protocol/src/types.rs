//! Request and response types for the plugin protocol.
//!
//! Each [`Request`] variant corresponds to one entry point the host calls on
//! the plugin; the matching [`Response`] carries its return value.

use calexport_core::{Channel, EventDraft, Program};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
///
/// Carries the protocol version and a request id used to correlate
/// responses with requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Creates a request envelope.
    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    /// Creates a response envelope.
    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Host settings handed to the plugin on activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// The host UI uses a dark theme.
    #[serde(default)]
    pub dark_theme: bool,
    /// Host version code.
    #[serde(default)]
    pub version_code: u32,
}

impl HostSettings {
    /// First host version that supports unmarking with a plugin icon.
    pub const UNMARK_WITH_ICON_VERSION: u32 = 308;

    /// Creates host settings.
    pub fn new(dark_theme: bool, version_code: u32) -> Self {
        Self {
            dark_theme,
            version_code,
        }
    }

    /// Returns true if the host can unmark a program for a specific plugin.
    pub fn supports_unmark_with_icon(&self) -> bool {
        self.version_code >= Self::UNMARK_WITH_ICON_VERSION
    }
}

/// A context menu entry offered for a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMenu {
    /// Plugin-defined menu id, echoed back on selection.
    pub id: i32,
    /// Label shown by the host.
    pub title: String,
}

impl PluginMenu {
    /// Creates a menu entry.
    pub fn new(id: i32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// Plugin metadata shown in the host's plugin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub license: String,
    pub description: String,
}

/// A target the plugin accepts program lists for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveTarget {
    pub id: i32,
    pub name: String,
}

/// Requests sent by the host to the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// The plugin was activated by the host.
    Activate {
        /// Host settings for this session.
        #[serde(default)]
        host: HostSettings,
    },

    /// The plugin was deactivated.
    Deactivate,

    /// Get plugin metadata.
    GetInfo,

    /// Get the icon the host shows next to marked programs.
    GetMarkIcon,

    /// Ask whether the plugin has preferences.
    HasPreferences,

    /// Open the preferences surface.
    OpenPreferences {
        /// Channels the user subscribed to in the host.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        subscribed_channels: Vec<Channel>,
    },

    /// Get context menu entries for a program.
    GetContextMenuActions {
        program: Program,
    },

    /// A context menu entry was selected.
    ContextMenuSelected {
        program: Program,
        menu: PluginMenu,
    },

    /// Get all marked program ids.
    GetMarkedPrograms,

    /// Ask whether a program is marked.
    IsMarked {
        program_id: i64,
    },

    /// The lowest program id the host still knows.
    FirstKnownProgramId {
        program_id: i64,
    },

    /// Write the marking set to the store now, making a prune durable.
    FlushMarkings,

    /// Get the targets the plugin accepts programs for.
    GetReceiveTargets,

    /// Hand a list of programs to one of the receive targets.
    ReceivePrograms {
        programs: Vec<Program>,
        target: ReceiveTarget,
    },

    /// Preview the event draft for a program without exporting it.
    DeriveDraft {
        program: Program,
    },

    /// Request daemon shutdown.
    Shutdown,

    /// Ping to check liveness.
    Ping,
}

impl Request {
    /// Creates an Activate request.
    pub fn activate(host: HostSettings) -> Self {
        Self::Activate { host }
    }

    /// Creates a GetContextMenuActions request.
    pub fn context_menu_actions(program: Program) -> Self {
        Self::GetContextMenuActions { program }
    }

    /// Creates a ContextMenuSelected request.
    pub fn context_menu_selected(program: Program, menu: PluginMenu) -> Self {
        Self::ContextMenuSelected { program, menu }
    }

    /// Creates an IsMarked request.
    pub fn is_marked(program_id: i64) -> Self {
        Self::IsMarked { program_id }
    }

    /// Creates a FirstKnownProgramId request.
    pub fn first_known_program_id(program_id: i64) -> Self {
        Self::FirstKnownProgramId { program_id }
    }

    /// Creates a DeriveDraft request.
    pub fn derive_draft(program: Program) -> Self {
        Self::DeriveDraft { program }
    }
}

/// Responses sent from the plugin to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Plugin metadata.
    Info {
        #[serde(flatten)]
        info: PluginInfo,
    },

    /// PNG bytes of the mark icon (empty when none is configured).
    MarkIcon { png: Vec<u8> },

    /// Whether the plugin has preferences.
    HasPreferences { has_preferences: bool },

    /// Context menu entries (possibly empty).
    MenuActions { actions: Vec<PluginMenu> },

    /// Result of a context menu selection.
    Handled { handled: bool },

    /// All marked program ids, ascending.
    MarkedPrograms { ids: Vec<i64> },

    /// Whether a program is marked.
    Marked { marked: bool },

    /// Receive targets.
    ReceiveTargets { targets: Vec<ReceiveTarget> },

    /// A derived event draft.
    Draft { draft: EventDraft },

    /// Generic success response.
    Ok,

    /// Error response.
    Error {
        #[serde(flatten)]
        error: ErrorResponse,
    },

    /// Pong response to Ping.
    Pong,
}

impl Response {
    /// Creates an Info response.
    pub fn info(info: PluginInfo) -> Self {
        Self::Info { info }
    }

    /// Creates a MenuActions response.
    pub fn menu_actions(actions: Vec<PluginMenu>) -> Self {
        Self::MenuActions { actions }
    }

    /// Creates a Handled response.
    pub fn handled(handled: bool) -> Self {
        Self::Handled { handled }
    }

    /// Creates an Error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse::new(code, message),
        }
    }

    /// Creates an error response from an ErrorResponse.
    pub fn from_error(error: ErrorResponse) -> Self {
        Self::Error { error }
    }

    /// Returns true unless this is an error response.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns the error if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Error codes for protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown or internal error.
    InternalError,

    /// Invalid request format.
    InvalidRequest,

    /// The plugin has not been activated yet.
    NotActivated,

    /// The preferences surface could not be opened.
    PreferencesUnavailable,

    /// Request timed out.
    Timeout,

    /// Daemon is shutting down.
    ShuttingDown,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "An internal error occurred",
            Self::InvalidRequest => "The request was invalid",
            Self::NotActivated => "The plugin is not activated",
            Self::PreferencesUnavailable => "Preferences could not be opened",
            Self::Timeout => "The request timed out",
            Self::ShuttingDown => "The plugin daemon is shutting down",
        }
    }
}

/// Error response details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}
