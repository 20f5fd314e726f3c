//! Marking ledger.
//!
//! Tracks which programs have been exported to the calendar. The set lives
//! in memory while the plugin is active and is written back to the
//! key-value store, as decimal strings, after every `mark`/`unmark`.
//!
//! The ledger has two states: unloaded (after construction or `unload`) and
//! loaded (after `load`). Every query and mutation requires the loaded state
//! and fails with [`LedgerError::NotLoaded`] otherwise.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult, StoreResult};
use crate::program::UNKNOWN_PROGRAM_ID;
use crate::store::KeyValueStore;

/// Store key holding the marked program ids.
pub const PREF_MARKINGS: &str = "PREF_MARKINGS";

/// The set of exported program ids.
pub struct MarkingLedger {
    store: Arc<dyn KeyValueStore>,
    key: String,
    ids: Option<HashSet<i64>>,
}

impl std::fmt::Debug for MarkingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkingLedger")
            .field("key", &self.key)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl MarkingLedger {
    /// Creates an unloaded ledger persisting to `store` under [`PREF_MARKINGS`].
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, PREF_MARKINGS)
    }

    /// Creates an unloaded ledger persisting under a custom key.
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            ids: None,
        }
    }

    /// Returns true if `load` has been called since the last `unload`.
    pub fn is_loaded(&self) -> bool {
        self.ids.is_some()
    }

    /// Loads the persisted set, replacing any in-memory state.
    ///
    /// A missing entry is an empty set. A failed read is logged and also
    /// yields an empty set; the next `mark`/`unmark` then overwrites it.
    /// Returns the number of loaded ids.
    pub fn load(&mut self) -> usize {
        let stored = match self.store.get_string_set(&self.key) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read markings, starting empty");
                HashSet::new()
            }
        };

        let mut ids = HashSet::with_capacity(stored.len());
        for raw in stored {
            match raw.parse::<i64>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => warn!(key = %self.key, value = %raw, "Dropping malformed marking"),
            }
        }

        let count = ids.len();
        info!(count = count, "Markings loaded");
        self.ids = Some(ids);
        count
    }

    /// Drops the in-memory set without writing it.
    pub fn unload(&mut self) {
        if self.ids.take().is_some() {
            debug!("Markings unloaded");
        }
    }

    /// Returns true if `id` is marked.
    pub fn contains(&self, id: i64) -> LedgerResult<bool> {
        Ok(self.ids("contains")?.contains(&id))
    }

    /// Marks `id` and persists the set. Returns true if `id` was new.
    pub fn mark(&mut self, id: i64) -> LedgerResult<bool> {
        let inserted = self.ids_mut("mark")?.insert(id);
        debug!(program_id = id, inserted = inserted, "Program marked");
        self.persist();
        Ok(inserted)
    }

    /// Unmarks `id`. Persists only when something was removed; unmarking an
    /// absent id is not an error. Returns true if `id` was removed.
    pub fn unmark(&mut self, id: i64) -> LedgerResult<bool> {
        let removed = self.ids_mut("unmark")?.remove(&id);
        if removed {
            debug!(program_id = id, "Program unmarked");
            self.persist();
        }
        Ok(removed)
    }

    /// Prunes ids the host no longer knows.
    ///
    /// [`UNKNOWN_PROGRAM_ID`] clears the whole set; any other value removes
    /// every id strictly below it. Nothing is persisted: the pruned set is
    /// written with the next `mark`/`unmark` or an explicit [`flush`].
    /// Returns the number of removed ids.
    ///
    /// [`flush`]: MarkingLedger::flush
    pub fn reconcile(&mut self, low_water_mark: i64) -> LedgerResult<usize> {
        let ids = self.ids_mut("reconcile")?;
        let before = ids.len();

        if low_water_mark == UNKNOWN_PROGRAM_ID {
            ids.clear();
        } else {
            ids.retain(|id| *id >= low_water_mark);
        }

        let removed = before - ids.len();
        debug!(low_water_mark = low_water_mark, removed = removed, "Markings reconciled");
        Ok(removed)
    }

    /// Writes the current set to the store, retrying once.
    ///
    /// Unlike `mark`/`unmark`, a failed write is returned to the caller.
    pub fn flush(&self) -> LedgerResult<()> {
        let ids = self.ids("flush")?;
        self.write_with_retry(ids)?;
        debug!(count = ids.len(), "Markings flushed");
        Ok(())
    }

    /// Returns the marked ids in ascending order.
    pub fn marked_ids(&self) -> LedgerResult<Vec<i64>> {
        let mut ids: Vec<i64> = self.ids("marked_ids")?.iter().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Returns the number of marked ids.
    pub fn len(&self) -> LedgerResult<usize> {
        Ok(self.ids("len")?.len())
    }

    /// Returns true if nothing is marked.
    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.ids("is_empty")?.is_empty())
    }

    fn ids(&self, operation: &'static str) -> LedgerResult<&HashSet<i64>> {
        self.ids
            .as_ref()
            .ok_or_else(|| LedgerError::not_loaded(operation))
    }

    fn ids_mut(&mut self, operation: &'static str) -> LedgerResult<&mut HashSet<i64>> {
        self.ids
            .as_mut()
            .ok_or_else(|| LedgerError::not_loaded(operation))
    }

    /// Best-effort write of the whole set: failures are logged.
    fn persist(&self) {
        let Some(ids) = self.ids.as_ref() else {
            return;
        };
        if let Err(e) = self.write_with_retry(ids) {
            warn!(key = %self.key, count = ids.len(), error = %e, "Failed to persist markings");
        }
    }

    fn write_with_retry(&self, ids: &HashSet<i64>) -> StoreResult<()> {
        let values: HashSet<String> = ids.iter().map(|id| id.to_string()).collect();

        self.store.put_string_set(&self.key, &values).or_else(|first| {
            debug!(error = %first, "Persisting markings failed, retrying once");
            self.store.put_string_set(&self.key, &values)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, StoredValue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loaded(ids: &[&str]) -> (Arc<MemoryStore>, MarkingLedger) {
        let store = Arc::new(MemoryStore::new());
        let set: HashSet<String> = ids.iter().map(|s| s.to_string()).collect();
        store.put_string_set(PREF_MARKINGS, &set).unwrap();

        let mut ledger = MarkingLedger::new(store.clone());
        ledger.load();
        (store, ledger)
    }

    fn persisted(store: &MemoryStore) -> HashSet<String> {
        store.get_string_set(PREF_MARKINGS).unwrap().unwrap_or_default()
    }

    /// Store whose writes always fail; counts attempts.
    #[derive(Default)]
    struct FailingStore {
        writes: AtomicUsize,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> StoreResult<Option<StoredValue>> {
            Ok(None)
        }

        fn put(&self, _key: &str, _value: StoredValue) -> StoreResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        fn remove(&self, _key: &str) -> StoreResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn operations_before_load_are_rejected() {
        let mut ledger = MarkingLedger::new(Arc::new(MemoryStore::new()));
        assert!(!ledger.is_loaded());

        assert!(matches!(
            ledger.contains(1),
            Err(LedgerError::NotLoaded { operation: "contains" })
        ));
        assert!(ledger.mark(1).is_err());
        assert!(ledger.unmark(1).is_err());
        assert!(ledger.reconcile(1).is_err());
        assert!(ledger.marked_ids().is_err());
        assert!(ledger.flush().is_err());
    }

    #[test]
    fn load_empty_store() {
        let mut ledger = MarkingLedger::new(Arc::new(MemoryStore::new()));
        assert_eq!(ledger.load(), 0);
        assert!(ledger.is_loaded());
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn load_drops_malformed_entries() {
        let (_, ledger) = loaded(&["5", "abc", "10"]);
        assert_eq!(ledger.marked_ids().unwrap(), vec![5, 10]);
    }

    #[test]
    fn mark_persists_and_is_idempotent() {
        let (store, mut ledger) = loaded(&[]);

        assert!(ledger.mark(42).unwrap());
        assert!(!ledger.mark(42).unwrap());

        assert_eq!(ledger.len().unwrap(), 1);
        assert!(ledger.contains(42).unwrap());
        assert_eq!(persisted(&store), ["42".to_string()].into_iter().collect());
    }

    #[test]
    fn unmark_absent_is_noop() {
        let (store, mut ledger) = loaded(&["1"]);

        assert!(!ledger.unmark(99).unwrap());
        assert!(ledger.unmark(1).unwrap());
        assert!(!ledger.contains(1).unwrap());
        assert!(persisted(&store).is_empty());
    }

    #[test]
    fn contains_is_exact_match() {
        let (_, ledger) = loaded(&["10"]);
        assert!(ledger.contains(10).unwrap());
        assert!(!ledger.contains(1).unwrap());
        assert!(!ledger.contains(100).unwrap());
    }

    #[test]
    fn reconcile_prunes_below_mark() {
        let (_, mut ledger) = loaded(&["5", "10", "15"]);
        assert_eq!(ledger.reconcile(10).unwrap(), 1);
        assert_eq!(ledger.marked_ids().unwrap(), vec![10, 15]);
    }

    #[test]
    fn reconcile_unknown_clears() {
        let (_, mut ledger) = loaded(&["5", "10", "15"]);
        assert_eq!(ledger.reconcile(UNKNOWN_PROGRAM_ID).unwrap(), 3);
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn reconcile_does_not_persist_until_flush() {
        let (store, mut ledger) = loaded(&["5", "10", "15"]);
        ledger.reconcile(10).unwrap();
        assert_eq!(persisted(&store).len(), 3);

        ledger.flush().unwrap();
        assert_eq!(
            persisted(&store),
            ["10".to_string(), "15".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn save_load_roundtrip_keeps_membership() {
        let (store, mut ledger) = loaded(&[]);
        for id in [3, 1, 2] {
            ledger.mark(id).unwrap();
        }
        ledger.unload();

        let mut reloaded = MarkingLedger::new(store);
        reloaded.load();
        assert_eq!(reloaded.marked_ids().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unload_keeps_persisted_copy() {
        let (store, mut ledger) = loaded(&["7"]);
        ledger.unload();
        assert!(!ledger.is_loaded());
        assert!(ledger.contains(7).is_err());
        assert!(persisted(&store).contains("7"));
    }

    #[test]
    fn persistence_failure_is_retried_and_swallowed() {
        let store = Arc::new(FailingStore::default());
        let mut ledger = MarkingLedger::new(store.clone());
        ledger.load();

        assert!(ledger.mark(1).unwrap());
        assert!(ledger.contains(1).unwrap());
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn flush_reports_write_failure() {
        let store = Arc::new(FailingStore::default());
        let mut ledger = MarkingLedger::new(store.clone());
        ledger.load();
        ledger.mark(1).unwrap();

        let result = ledger.flush();
        assert!(matches!(result, Err(LedgerError::Store(StoreError::Io(_)))));
        assert_eq!(store.writes.load(Ordering::SeqCst), 4);
        assert!(ledger.contains(1).unwrap());
    }

    #[test]
    fn custom_key() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MarkingLedger::with_key(store.clone(), "other");
        ledger.load();
        ledger.mark(4).unwrap();

        assert!(store.get_string_set("other").unwrap().is_some());
        assert!(store.get_string_set(PREF_MARKINGS).unwrap().is_none());
    }
}
