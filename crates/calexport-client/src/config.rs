//! Client configuration.
//!
//! Settings live in `config.toml` under the user's configuration directory
//! (`~/.config/calexport/config.toml` on Linux). Every section is optional.
//! Export preferences are not part of this file; they live in the store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calexport_protocol::HostSettings;
use calexport_server::ServerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration for the `calexport` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug logging.
    pub debug: bool,

    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub calendar: CalendarSettings,
    pub plugin: PluginSettings,
}

/// Socket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Path to the daemon socket.
    pub socket_path: Option<PathBuf>,

    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: 5,
        }
    }
}

/// Where preferences and markings are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON store file.
    pub path: Option<PathBuf>,
}

/// Calendar file output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Directory `.ics` files are written to.
    pub outbox_dir: Option<PathBuf>,

    /// Open each exported file with the default calendar application.
    pub open_with_default_app: bool,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            outbox_dir: None,
            open_with_default_app: true,
        }
    }
}

/// How `serve` presents itself to the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// PNG shown by the host next to marked programs.
    pub mark_icon: Option<PathBuf>,

    /// Host version code reported on activation.
    pub version_code: u32,

    /// Host uses a dark theme.
    pub dark_theme: bool,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            mark_icon: None,
            version_code: HostSettings::UNMARK_WITH_ICON_VERSION,
            dark_theme: false,
        }
    }
}

impl ClientConfig {
    /// Loads the default file, or defaults when it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads a specific file.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calexport")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calexport")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .clone()
            .unwrap_or_else(calexport_server::default_socket_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout)
    }

    pub fn store_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("store.json"))
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.calendar
            .outbox_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("outbox"))
    }

    /// Host settings `serve` activates the plugin with.
    pub fn host_settings(&self) -> HostSettings {
        HostSettings::new(self.plugin.dark_theme, self.plugin.version_code)
    }

    /// Daemon configuration derived from this file.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.socket_path())
            .with_store_path(self.store_path())
            .with_outbox_dir(self.outbox_dir())
            .with_open_with_default_app(self.calendar.open_with_default_app)
            .with_mark_icon(self.plugin.mark_icon.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.server.timeout, 5);
        assert!(config.calendar.open_with_default_app);
        assert_eq!(config.plugin.version_code, 308);
    }

    #[test]
    fn sections_override_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
debug = true

[server]
socket_path = "/run/user/1000/cal.sock"
timeout = 9

[storage]
path = "/data/store.json"

[calendar]
outbox_dir = "/data/outbox"
open_with_default_app = false

[plugin]
mark_icon = "/data/mark.png"
version_code = 300
"#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.socket_path(), PathBuf::from("/run/user/1000/cal.sock"));
        assert_eq!(config.timeout(), Duration::from_secs(9));
        assert_eq!(config.store_path(), PathBuf::from("/data/store.json"));
        assert!(!config.host_settings().supports_unmark_with_icon());

        let server = config.server_config();
        assert_eq!(server.outbox_dir, PathBuf::from("/data/outbox"));
        assert!(!server.open_with_default_app);
        assert_eq!(server.mark_icon, Some(PathBuf::from("/data/mark.png")));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: ClientConfig = toml::from_str("[server]\ntimeout = 1\n").unwrap();
        assert_eq!(config.server.timeout, 1);
        assert!(config.server.socket_path.is_none());
        assert!(config.store_path().ends_with("calexport/store.json"));
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\n").unwrap();

        let result = ClientConfig::load_from(&path);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn dump_round_trips_through_toml() {
        let mut config = ClientConfig::default();
        config.storage.path = Some(PathBuf::from("/data/store.json"));

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
