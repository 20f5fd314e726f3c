//! Preferences surface.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::PreferencesError;

/// Lets the user edit the export preferences.
pub trait PreferencesSurface: Send + Sync {
    /// Opens the editor. `dark_theme` mirrors the host's theme.
    fn open(&self, dark_theme: bool) -> Result<(), PreferencesError>;
}

/// Opens the JSON store file with the desktop's default editor.
#[derive(Debug, Clone)]
pub struct FilePreferencesSurface {
    path: PathBuf,
}

impl FilePreferencesSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferencesSurface for FilePreferencesSurface {
    fn open(&self, dark_theme: bool) -> Result<(), PreferencesError> {
        if !self.path.is_file() {
            return Err(PreferencesError::NotFound {
                path: self.path.clone(),
            });
        }

        info!(path = %self.path.display(), dark_theme, "Opening preferences");
        open::that(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let surface = FilePreferencesSurface::new(dir.path().join("store.json"));

        let result = surface.open(true);
        assert!(matches!(result, Err(PreferencesError::NotFound { .. })));
    }
}
