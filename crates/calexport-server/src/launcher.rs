//! Calendar launch surface.
//!
//! [`IcsLauncher`] writes each draft as a single-event iCalendar file into an
//! outbox directory and can hand the file to the desktop's calendar
//! application.

use std::io;
use std::path::{Path, PathBuf};

use calexport_core::EventDraft;
use icalendar::{Calendar, Component, EventLike};
use tracing::{debug, info, warn};

use crate::error::{LaunchError, LaunchResult};

/// Something that can turn an [`EventDraft`] into a calendar entry.
pub trait CalendarLauncher: Send + Sync {
    /// Returns true if a calendar is reachable right now.
    fn is_available(&self) -> bool;

    /// Hands the draft to the calendar.
    fn launch(&self, draft: &EventDraft) -> LaunchResult<()>;
}

type Opener = fn(&Path) -> io::Result<()>;

fn open_with_desktop(path: &Path) -> io::Result<()> {
    open::that(path)
}

/// Writes `.ics` files into an outbox directory.
#[derive(Debug, Clone)]
pub struct IcsLauncher {
    outbox: PathBuf,
    open_with_default_app: bool,
    opener: Opener,
}

impl IcsLauncher {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
            open_with_default_app: false,
            opener: open_with_desktop,
        }
    }

    /// Also open each written file with the default handler.
    pub fn with_open_with_default_app(mut self, open: bool) -> Self {
        self.open_with_default_app = open;
        self
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    /// Writes the draft and returns the path of the new file. The outbox is
    /// created on first use.
    pub fn write(&self, draft: &EventDraft) -> LaunchResult<PathBuf> {
        if !self.is_available() {
            return Err(LaunchError::Unavailable {
                path: self.outbox.clone(),
            });
        }
        std::fs::create_dir_all(&self.outbox).map_err(|e| {
            warn!(path = %self.outbox.display(), error = %e, "Failed to create outbox");
            LaunchError::Unavailable {
                path: self.outbox.clone(),
            }
        })?;

        let uid = uuid::Uuid::new_v4().to_string();
        let path = self.outbox.join(file_name(draft, &uid));
        std::fs::write(&path, render_ics(draft, &uid))?;

        debug!(path = %path.display(), "Wrote calendar file");
        Ok(path)
    }

    /// Opens a written file. On failure the file is removed so a refused
    /// export leaves nothing behind in the outbox.
    fn open(&self, path: PathBuf) -> LaunchResult<()> {
        if let Err(source) = (self.opener)(&path) {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove unopened calendar file");
            }
            return Err(LaunchError::Open { path, source });
        }
        Ok(())
    }
}

impl CalendarLauncher for IcsLauncher {
    /// True when the outbox exists, or could be created under its nearest
    /// existing ancestor. Nothing is created here.
    fn is_available(&self) -> bool {
        self.outbox
            .ancestors()
            .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
            .find(|dir| dir.exists())
            .and_then(|dir| std::fs::metadata(dir).ok())
            .is_some_and(|meta| meta.is_dir() && !meta.permissions().readonly())
    }

    fn launch(&self, draft: &EventDraft) -> LaunchResult<()> {
        let path = self.write(draft)?;
        if self.open_with_default_app {
            self.open(path.clone())?;
        }

        info!(title = %draft.title, path = %path.display(), "Exported program to calendar");
        Ok(())
    }
}

/// Renders the draft as a VCALENDAR with one VEVENT.
pub fn render_ics(draft: &EventDraft, uid: &str) -> String {
    let mut event = icalendar::Event::new();
    event.uid(uid);
    event.summary(&draft.title);
    event.starts(draft.start);
    event.ends(draft.end);

    if let Some(ref location) = draft.location {
        event.location(location);
    }
    if let Some(ref description) = draft.description {
        event.description(description);
    }

    let mut calendar = Calendar::new();
    calendar.push(event.done());
    calendar.done().to_string()
}

fn file_name(draft: &EventDraft, uid: &str) -> String {
    format!("{}-{}.ics", draft.start.format("%Y%m%dT%H%M"), uid)
}
