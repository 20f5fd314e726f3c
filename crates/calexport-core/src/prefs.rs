//! Export preferences.
//!
//! User choices that shape the event draft. They live in the key-value store
//! under the keys below, using the same value encoding the settings screen
//! writes: list choices as `"0"`/`"1"` text, toggles as booleans.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreResult;
use crate::store::KeyValueStore;

/// Key for the description source choice.
pub const PREF_DESCRIPTION_TYPE: &str = "PREF_CALENDAR_EXPORT_DESCRIPTION_TYPE";
/// Key for the channel-in-title toggle.
pub const PREF_TITLE_CONTAINS_CHANNEL: &str = "PREF_CALENDAR_EXPORT_TITLE_CONTAINS_CHANNEL";
/// Key for the channel position choice.
pub const PREF_TITLE_CHANNEL_POSITION: &str = "PREF_CALENDAR_EXPORT_TITLE_CHANNEL_POSITION";
/// Key for the channel-in-location toggle.
pub const PREF_LOCATION_CONTAINS_CHANNEL: &str = "PREF_CALENDAR_EXPORT_LOCATION_CONTAINS_CHANNEL";

/// Which program description feeds the event description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    /// Prefer the short description.
    #[default]
    Short,
    /// Prefer the full description.
    Full,
}

impl DescriptionSource {
    /// Value written to the store.
    pub fn as_pref_value(&self) -> &'static str {
        match self {
            Self::Short => "0",
            Self::Full => "1",
        }
    }

    /// Parses a stored value.
    pub fn from_pref_value(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Self::Short),
            "1" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Where the channel name goes when it is added to the title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPosition {
    /// `"<channel>: <title>"`
    #[default]
    Prefix,
    /// `"<title> (<channel>)"`
    Suffix,
}

impl ChannelPosition {
    /// Value written to the store.
    pub fn as_pref_value(&self) -> &'static str {
        match self {
            Self::Prefix => "0",
            Self::Suffix => "1",
        }
    }

    /// Parses a stored value. Anything other than `"0"` is a suffix.
    pub fn from_pref_value(value: &str) -> Self {
        if value == "0" {
            Self::Prefix
        } else {
            Self::Suffix
        }
    }
}

/// User preferences for building calendar events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPreferences {
    /// Description source.
    pub description_source: DescriptionSource,
    /// Add the channel name to the title.
    pub channel_in_title: bool,
    /// Position of the channel name in the title.
    pub channel_position: ChannelPosition,
    /// Put the channel name in the location. Only consulted when
    /// `channel_in_title` is set.
    pub channel_in_location: bool,
}

impl Default for ExportPreferences {
    fn default() -> Self {
        Self {
            description_source: DescriptionSource::Short,
            channel_in_title: false,
            channel_position: ChannelPosition::Prefix,
            channel_in_location: true,
        }
    }
}

impl ExportPreferences {
    /// Builder: set the description source.
    #[must_use]
    pub fn with_description_source(mut self, source: DescriptionSource) -> Self {
        self.description_source = source;
        self
    }

    /// Builder: add the channel name to the title at `position`.
    #[must_use]
    pub fn with_channel_in_title(mut self, position: ChannelPosition) -> Self {
        self.channel_in_title = true;
        self.channel_position = position;
        self
    }

    /// Builder: set the channel-in-location toggle.
    #[must_use]
    pub fn with_channel_in_location(mut self, enabled: bool) -> Self {
        self.channel_in_location = enabled;
        self
    }

    /// Applies the settings screen rule: with the channel kept out of the
    /// title, it always goes to the location.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.channel_in_title {
            self.channel_in_location = true;
        }
        self
    }

    /// Reads preferences from `store`.
    ///
    /// Never fails: missing keys keep their defaults, and unreadable or
    /// malformed values are logged and replaced by the default.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();

        let description_source = read_text(store, PREF_DESCRIPTION_TYPE)
            .and_then(|value| {
                let parsed = DescriptionSource::from_pref_value(&value);
                if parsed.is_none() {
                    warn!(key = PREF_DESCRIPTION_TYPE, value = %value, "Unknown description type");
                }
                parsed
            })
            .unwrap_or(defaults.description_source);

        let channel_position = read_text(store, PREF_TITLE_CHANNEL_POSITION)
            .map(|value| ChannelPosition::from_pref_value(&value))
            .unwrap_or(defaults.channel_position);

        Self {
            description_source,
            channel_in_title: read_bool(store, PREF_TITLE_CONTAINS_CHANNEL)
                .unwrap_or(defaults.channel_in_title),
            channel_position,
            channel_in_location: read_bool(store, PREF_LOCATION_CONTAINS_CHANNEL)
                .unwrap_or(defaults.channel_in_location),
        }
    }

    /// Writes preferences to `store`, normalized first.
    pub fn save(&self, store: &dyn KeyValueStore) -> StoreResult<()> {
        let prefs = self.normalized();
        store.put(
            PREF_DESCRIPTION_TYPE,
            prefs.description_source.as_pref_value().into(),
        )?;
        store.put(PREF_TITLE_CONTAINS_CHANNEL, prefs.channel_in_title.into())?;
        store.put(
            PREF_TITLE_CHANNEL_POSITION,
            prefs.channel_position.as_pref_value().into(),
        )?;
        store.put(
            PREF_LOCATION_CONTAINS_CHANNEL,
            prefs.channel_in_location.into(),
        )?;
        Ok(())
    }
}

fn logged<T>(key: &str, result: StoreResult<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!(key, error = %e, "Failed to read preference");
        None
    })
}

fn read_text(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    logged(key, store.get_text(key))
}

fn read_bool(store: &dyn KeyValueStore, key: &str) -> Option<bool> {
    logged(key, store.get_bool(key))
}
