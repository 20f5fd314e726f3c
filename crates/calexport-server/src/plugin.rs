//! The calendar export plugin.
//!
//! [`Plugin`] is the method set a TV-guide host calls on a plugin;
//! [`PluginManager`] is the part of the host the plugin calls back into.
//! [`CalendarExportPlugin`] wires the draft derivation and the marking
//! ledger to a [`CalendarLauncher`] and a [`PreferencesSurface`].

use std::path::PathBuf;
use std::sync::Arc;

use calexport_core::{
    Channel, EventDraft, ExportPreferences, JsonFileStore, KeyValueStore, LedgerError,
    MarkingLedger, Program,
};
use calexport_protocol::{HostSettings, PluginInfo, PluginMenu, ReceiveTarget};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{PluginError, PluginResult, ServerResult};
use crate::launcher::{CalendarLauncher, IcsLauncher};
use crate::preferences::{FilePreferencesSurface, PreferencesSurface};

/// Identifier the host uses to tell plugins apart.
pub const PLUGIN_ID: &str = "calexport";

/// Menu id of the export entry.
pub const EXPORT_MENU_ID: i32 = 1;

/// Menu id of the unmark entry.
pub const UNMARK_MENU_ID: i32 = 2;

const EXPORT_MENU_TITLE: &str = "Export to calendar";
const UNMARK_MENU_TITLE: &str = "Remove calendar marking";

/// Host services available to an activated plugin.
pub trait PluginManager: Send + Sync {
    fn settings(&self) -> HostSettings;

    /// Asks the host to drop every marking of `program`.
    fn unmark_program(&self, program: &Program) -> bool;

    /// Asks the host to drop only this plugin's marking of `program`.
    fn unmark_program_with_icon(&self, program: &Program, plugin_id: &str) -> bool;
}

/// Entry points a host calls on a plugin.
pub trait Plugin {
    fn name(&self) -> String;
    fn version(&self) -> String;
    fn author(&self) -> String;
    fn license(&self) -> String;
    fn description(&self) -> String;

    /// Metadata bundle for the host's plugin list.
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.name(),
            version: self.version(),
            author: self.author(),
            license: self.license(),
            description: self.description(),
        }
    }

    fn on_activation(&mut self, manager: Arc<dyn PluginManager>);
    fn on_deactivation(&mut self);

    /// PNG bytes shown next to marked programs. Empty when there is none.
    fn mark_icon(&self) -> Vec<u8>;

    fn has_preferences(&self) -> bool;
    fn open_preferences(&self, subscribed_channels: &[Channel]) -> PluginResult<()>;

    fn context_menu_actions(&self, program: &Program) -> PluginResult<Vec<PluginMenu>>;

    /// Runs the selected menu action. Returns true if the host should mark
    /// the program.
    fn context_menu_selected(&mut self, program: &Program, menu: &PluginMenu)
    -> PluginResult<bool>;

    fn marked_programs(&self) -> PluginResult<Vec<i64>>;
    fn is_marked(&self, program_id: i64) -> PluginResult<bool>;

    /// Called with the lowest program id the host still knows.
    fn handle_first_known_program_id(&mut self, program_id: i64) -> PluginResult<()>;

    fn receive_targets(&self) -> Vec<ReceiveTarget> {
        Vec::new()
    }

    fn receive_programs(&mut self, _programs: &[Program], _target: &ReceiveTarget) -> bool {
        false
    }
}

/// Exports programs as calendar events and remembers which ones it exported.
pub struct CalendarExportPlugin {
    store: Arc<dyn KeyValueStore>,
    ledger: MarkingLedger,
    launcher: Arc<dyn CalendarLauncher>,
    preferences: Arc<dyn PreferencesSurface>,
    manager: Option<Arc<dyn PluginManager>>,
    mark_icon: Option<PathBuf>,
}

impl std::fmt::Debug for CalendarExportPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarExportPlugin")
            .field("ledger", &self.ledger)
            .field("activated", &self.manager.is_some())
            .field("mark_icon", &self.mark_icon)
            .finish_non_exhaustive()
    }
}

impl CalendarExportPlugin {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        launcher: Arc<dyn CalendarLauncher>,
        preferences: Arc<dyn PreferencesSurface>,
    ) -> Self {
        Self {
            ledger: MarkingLedger::new(store.clone()),
            store,
            launcher,
            preferences,
            manager: None,
            mark_icon: None,
        }
    }

    /// Builds the plugin the daemon serves: a JSON file store, an `.ics`
    /// outbox and the store file as preferences surface.
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        let store = Arc::new(JsonFileStore::open(&config.store_path)?);
        let launcher = IcsLauncher::new(&config.outbox_dir)
            .with_open_with_default_app(config.open_with_default_app);
        let preferences = FilePreferencesSurface::new(&config.store_path);

        Ok(Self::new(store, Arc::new(launcher), Arc::new(preferences))
            .with_mark_icon(config.mark_icon.clone()))
    }

    pub fn with_mark_icon(mut self, path: Option<PathBuf>) -> Self {
        self.mark_icon = path;
        self
    }

    pub fn is_activated(&self) -> bool {
        self.manager.is_some()
    }

    /// Current export preferences as stored.
    pub fn preferences(&self) -> ExportPreferences {
        self.reload_store();
        ExportPreferences::load(self.store.as_ref())
    }

    fn reload_store(&self) {
        if let Err(e) = self.store.reload() {
            warn!(error = %e, "Failed to reload store, using cached values");
        }
    }

    /// Writes the marking set to the store now.
    ///
    /// Pruning through [`Plugin::handle_first_known_program_id`] only changes
    /// memory; this makes it durable and reports a failed write.
    pub fn flush_markings(&self) -> PluginResult<()> {
        self.ledger.flush()?;
        Ok(())
    }

    /// The draft an export of `program` would produce right now.
    pub fn derive_draft(&self, program: &Program) -> EventDraft {
        EventDraft::derive(program, &self.preferences())
    }

    fn export(&mut self, program: &Program) -> PluginResult<bool> {
        if !self.ledger.is_loaded() {
            return Err(LedgerError::not_loaded("export").into());
        }

        let draft = self.derive_draft(program);
        if let Err(e) = self.launcher.launch(&draft) {
            warn!(program_id = program.id, error = %e, "Calendar export failed");
            return Ok(false);
        }

        self.ledger.mark(program.id)?;
        Ok(true)
    }

    fn unmark(&mut self, program: &Program) -> PluginResult<()> {
        let Some(manager) = self.manager.clone() else {
            return Err(PluginError::not_activated("unmark"));
        };

        if !self.ledger.contains(program.id)? {
            debug!(program_id = program.id, "Program not marked, nothing to unmark");
            return Ok(());
        }

        let acknowledged = if manager.settings().supports_unmark_with_icon() {
            manager.unmark_program_with_icon(program, PLUGIN_ID)
        } else {
            manager.unmark_program(program)
        };

        if acknowledged {
            self.ledger.unmark(program.id)?;
            info!(program_id = program.id, "Removed calendar marking");
        } else {
            warn!(program_id = program.id, "Host refused to unmark program");
        }
        Ok(())
    }
}

impl Plugin for CalendarExportPlugin {
    fn name(&self) -> String {
        "Simple Calendar Export".to_string()
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn author(&self) -> String {
        "René Mach".to_string()
    }

    fn license(&self) -> String {
        env!("CARGO_PKG_LICENSE").to_string()
    }

    fn description(&self) -> String {
        "Exports programs as events to the calendar.".to_string()
    }

    fn on_activation(&mut self, manager: Arc<dyn PluginManager>) {
        self.reload_store();
        let marked = self.ledger.load();
        let settings = manager.settings();
        self.manager = Some(manager);
        info!(
            marked,
            version_code = settings.version_code,
            "Calendar export plugin activated"
        );
    }

    fn on_deactivation(&mut self) {
        self.ledger.unload();
        self.manager = None;
        info!("Calendar export plugin deactivated");
    }

    fn mark_icon(&self) -> Vec<u8> {
        let Some(ref path) = self.mark_icon else {
            return Vec::new();
        };
        std::fs::read(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Failed to read mark icon");
            Vec::new()
        })
    }

    fn has_preferences(&self) -> bool {
        true
    }

    fn open_preferences(&self, subscribed_channels: &[Channel]) -> PluginResult<()> {
        let dark_theme = self
            .manager
            .as_ref()
            .is_some_and(|manager| manager.settings().dark_theme);
        debug!(
            channels = subscribed_channels.len(),
            dark_theme, "Opening preferences"
        );
        self.preferences.open(dark_theme)?;
        Ok(())
    }

    fn context_menu_actions(&self, program: &Program) -> PluginResult<Vec<PluginMenu>> {
        if self.ledger.contains(program.id)? {
            return Ok(vec![PluginMenu::new(UNMARK_MENU_ID, UNMARK_MENU_TITLE)]);
        }

        if program.starts_after(Utc::now()) && self.launcher.is_available() {
            Ok(vec![PluginMenu::new(EXPORT_MENU_ID, EXPORT_MENU_TITLE)])
        } else {
            Ok(Vec::new())
        }
    }

    fn context_menu_selected(
        &mut self,
        program: &Program,
        menu: &PluginMenu,
    ) -> PluginResult<bool> {
        match menu.id {
            EXPORT_MENU_ID => self.export(program),
            UNMARK_MENU_ID => {
                self.unmark(program)?;
                Ok(false)
            }
            other => {
                debug!(menu_id = other, "Ignoring unknown menu entry");
                Ok(false)
            }
        }
    }

    fn marked_programs(&self) -> PluginResult<Vec<i64>> {
        Ok(self.ledger.marked_ids()?)
    }

    fn is_marked(&self, program_id: i64) -> PluginResult<bool> {
        Ok(self.ledger.contains(program_id)?)
    }

    fn handle_first_known_program_id(&mut self, program_id: i64) -> PluginResult<()> {
        let removed = self.ledger.reconcile(program_id)?;
        debug!(low_water_mark = program_id, removed, "Pruned markings");
        Ok(())
    }
}
