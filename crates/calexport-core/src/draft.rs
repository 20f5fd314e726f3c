//! Calendar event drafts.
//!
//! [`EventDraft::derive`] turns a [`Program`] and the user's
//! [`ExportPreferences`] into the fields handed to the calendar. Derivation
//! is pure: the same inputs always give the same draft, and missing program
//! fields only ever make a draft field absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prefs::{ChannelPosition, DescriptionSource, ExportPreferences};
use crate::program::Program;

/// Number of characters kept when a full description stands in for a
/// missing short description.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 160;

/// Appended to a truncated description.
pub const ELLIPSIS: char = '\u{2026}';

/// Separator between the episode title and the description body.
const PARAGRAPH_BREAK: &str = "\n\n";

/// The fields of a calendar event, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Event title.
    pub title: String,
    /// Event location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Event description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start instant (UTC).
    pub start: DateTime<Utc>,
    /// End instant (UTC).
    pub end: DateTime<Utc>,
}

impl EventDraft {
    /// Derives the draft for `program` under `prefs`.
    pub fn derive(program: &Program, prefs: &ExportPreferences) -> Self {
        Self {
            title: derive_title(program, prefs),
            location: derive_location(program, prefs),
            description: derive_description(program, prefs.description_source),
            start: program.start,
            end: program.end,
        }
    }
}

/// Builds the event title, adding the channel name when configured.
pub fn derive_title(program: &Program, prefs: &ExportPreferences) -> String {
    if !prefs.channel_in_title {
        return program.title.clone();
    }

    match prefs.channel_position {
        ChannelPosition::Prefix => format!("{}: {}", program.channel_name(), program.title),
        ChannelPosition::Suffix => format!("{} ({})", program.title, program.channel_name()),
    }
}

/// Returns the location: the channel name, unless the channel already sits
/// in the title and the user turned the location off.
pub fn derive_location(program: &Program, prefs: &ExportPreferences) -> Option<String> {
    if !prefs.channel_in_title || prefs.channel_in_location {
        Some(program.channel_name().to_string())
    } else {
        None
    }
}

/// Builds the full event description: episode title, blank line, body.
pub fn derive_description(program: &Program, source: DescriptionSource) -> Option<String> {
    let episode = non_empty(&program.episode_title);
    let body = body_description(program, source);

    match (episode, body) {
        (Some(episode), Some(body)) => Some(format!("{episode}{PARAGRAPH_BREAK}{body}")),
        (Some(episode), None) => Some(episode.to_string()),
        (None, body) => body,
    }
}

/// Picks the description body.
///
/// Order: the full description when preferred, then the short description,
/// then a preview of the full description cut to
/// [`DESCRIPTION_PREVIEW_CHARS`] characters.
pub fn body_description(program: &Program, source: DescriptionSource) -> Option<String> {
    if source == DescriptionSource::Full
        && let Some(full) = non_empty(&program.description)
    {
        return Some(full.to_string());
    }

    if let Some(short) = non_empty(&program.short_description) {
        return Some(short.to_string());
    }

    let full = program.description.as_deref()?;
    let trimmed = full.trim();

    if trimmed.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let mut preview: String = trimmed.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        preview.push(ELLIPSIS);
        Some(preview)
    } else if !trimmed.is_empty() {
        Some(full.to_string())
    } else {
        None
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
