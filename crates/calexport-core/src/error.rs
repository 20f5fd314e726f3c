//! Core error types.

use std::io;
use thiserror::Error;

/// Result type for key-value store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for marking ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised by a key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors raised by the marking ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An operation was attempted before `load()`.
    #[error("marking ledger is not loaded (attempted {operation})")]
    NotLoaded { operation: &'static str },

    /// An explicit flush could not write the set.
    #[error("failed to persist markings: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Creates a not-loaded error for the named operation.
    pub fn not_loaded(operation: &'static str) -> Self {
        Self::NotLoaded { operation }
    }
}
