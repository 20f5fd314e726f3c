//! Preference commands. These edit the store file directly; a running
//! daemon picks the change up on its next preference read.

use calexport_core::{ChannelPosition, DescriptionSource, ExportPreferences, JsonFileStore};
use tracing::debug;

use crate::cli::PrefsUpdate;
use crate::config::ClientConfig;
use crate::error::ClientResult;

fn open_store(config: &ClientConfig) -> ClientResult<JsonFileStore> {
    let path = config.store_path();
    debug!(path = %path.display(), "Opening preference store");
    Ok(JsonFileStore::open(path)?)
}

/// Prints the stored preferences.
pub fn show(config: &ClientConfig) -> ClientResult<()> {
    let store = open_store(config)?;
    print!("{}", format_prefs(&ExportPreferences::load(&store)));
    Ok(())
}

/// Applies `update` to the stored preferences and prints the result.
pub fn set(config: &ClientConfig, update: &PrefsUpdate) -> ClientResult<()> {
    let store = open_store(config)?;
    let prefs = apply(ExportPreferences::load(&store), update);
    prefs.save(&store)?;
    print!("{}", format_prefs(&prefs));
    Ok(())
}

/// Merges command-line changes into `prefs`. The result is normalized.
pub fn apply(mut prefs: ExportPreferences, update: &PrefsUpdate) -> ExportPreferences {
    if let Some(description) = update.description {
        prefs = prefs.with_description_source(description.into());
    }
    if let Some(title) = update.channel_in_title {
        prefs = match title.position() {
            Some(position) => prefs.with_channel_in_title(position),
            None => ExportPreferences {
                channel_in_title: false,
                ..prefs
            },
        };
    }
    if let Some(enabled) = update.channel_in_location {
        prefs = prefs.with_channel_in_location(enabled);
    }
    prefs.normalized()
}

pub fn format_prefs(prefs: &ExportPreferences) -> String {
    let description = match prefs.description_source {
        DescriptionSource::Short => "short",
        DescriptionSource::Full => "full",
    };
    let title = match (prefs.channel_in_title, prefs.channel_position) {
        (false, _) => "off",
        (true, ChannelPosition::Prefix) => "prefix",
        (true, ChannelPosition::Suffix) => "suffix",
    };
    format!(
        "description:         {}\nchannel in title:    {}\nchannel in location: {}\n",
        description, title, prefs.channel_in_location
    )
}
