//! Core types: programs, export preferences, event drafts, marking ledger

pub mod draft;
pub mod error;
pub mod ledger;
pub mod prefs;
pub mod program;
pub mod store;
pub mod tracing;

pub use draft::{
    DESCRIPTION_PREVIEW_CHARS, ELLIPSIS, EventDraft, body_description, derive_description,
    derive_location, derive_title,
};
pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use ledger::{MarkingLedger, PREF_MARKINGS};
pub use prefs::{ChannelPosition, DescriptionSource, ExportPreferences};
pub use program::{Channel, Program, UNKNOWN_PROGRAM_ID};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoredValue};
pub use self::tracing::{TracingConfig, TracingError, init_tracing};
