//! Program types supplied by the host.
//!
//! A [`Program`] is a single broadcast entry from the program guide. The host
//! owns it; this crate only reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Program id the host reports when it does not know any program.
pub const UNKNOWN_PROGRAM_ID: i64 = -1;

/// A broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Host-assigned channel identifier.
    pub id: i64,
    /// Display name of the channel.
    pub name: String,
}

impl Channel {
    /// Creates a new channel.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A broadcast program entry.
///
/// Identifiers are assigned by the host in ingestion order, so a smaller id
/// means an older entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Host-assigned identifier.
    pub id: i64,
    /// Program title.
    pub title: String,
    /// Short description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    /// Full description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Episode title, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    /// Channel the program airs on.
    pub channel: Channel,
    /// Start instant (UTC).
    pub start: DateTime<Utc>,
    /// End instant (UTC).
    pub end: DateTime<Utc>,
}

impl Program {
    /// Creates a program with no descriptions and no episode title.
    pub fn new(
        id: i64,
        title: impl Into<String>,
        channel: Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            short_description: None,
            description: None,
            episode_title: None,
            channel,
            start,
            end,
        }
    }

    /// Builder: set the short description.
    pub fn with_short_description(mut self, text: impl Into<String>) -> Self {
        self.short_description = Some(text.into());
        self
    }

    /// Builder: set the full description.
    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Builder: set the episode title.
    pub fn with_episode_title(mut self, text: impl Into<String>) -> Self {
        self.episode_title = Some(text.into());
        self
    }

    /// Returns the channel name.
    pub fn channel_name(&self) -> &str {
        &self.channel.name
    }

    /// Returns true if the program starts after `now`.
    pub fn starts_after(&self, now: DateTime<Utc>) -> bool {
        self.start > now
    }
}
