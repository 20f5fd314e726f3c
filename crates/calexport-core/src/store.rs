//! Durable key-value storage for preferences and markings.
//!
//! The plugin keeps its state in a flat key-value store: a handful of scalar
//! preferences plus one set-of-strings entry holding the marked program ids.
//! [`KeyValueStore`] is the capability the rest of the crate depends on;
//! [`MemoryStore`] and [`JsonFileStore`] are the two implementations.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{StoreError, StoreResult};

/// A value held in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Text(String),
    StringSet(BTreeSet<String>),
}

impl StoredValue {
    /// Short name of the value kind, for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::StringSet(_) => "string set",
        }
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A named key-value store.
///
/// Writes replace the stored value wholesale. Implementations use interior
/// mutability so one store can be shared between the ledger and the
/// preference loader.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<StoredValue>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: StoredValue) -> StoreResult<()>;

    /// Removes `key`. Returns true if a value was present.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Returns the text value under `key`. Integers read as their decimal
    /// form; any other kind is logged and reads as absent.
    fn get_text(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(match self.get(key)? {
            None => None,
            Some(StoredValue::Text(text)) => Some(text),
            Some(StoredValue::Int(n)) => Some(n.to_string()),
            Some(other) => {
                warn!(key, kind = other.kind(), "Expected a text value");
                None
            }
        })
    }

    /// Returns the boolean under `key`. The texts `"true"` and `"false"`
    /// are accepted; anything else is logged and reads as absent.
    fn get_bool(&self, key: &str) -> StoreResult<Option<bool>> {
        Ok(match self.get(key)? {
            None => None,
            Some(StoredValue::Bool(flag)) => Some(flag),
            Some(StoredValue::Text(text)) if text == "true" => Some(true),
            Some(StoredValue::Text(text)) if text == "false" => Some(false),
            Some(other) => {
                warn!(key, value = ?other, "Expected a boolean value");
                None
            }
        })
    }

    /// Returns the set-of-strings value under `key`.
    ///
    /// A value of another kind reads as absent.
    fn get_string_set(&self, key: &str) -> StoreResult<Option<HashSet<String>>> {
        Ok(match self.get(key)? {
            Some(StoredValue::StringSet(set)) => Some(set.into_iter().collect()),
            _ => None,
        })
    }

    /// Stores a set of strings under `key`.
    fn put_string_set(&self, key: &str, values: &HashSet<String>) -> StoreResult<()> {
        let set: BTreeSet<String> = values.iter().cloned().collect();
        self.put(key, StoredValue::StringSet(set))
    }

    /// Picks up changes other processes made to the backing storage.
    fn reload(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.remove(key).is_some())
    }
}

type Values = BTreeMap<String, StoredValue>;

/// Store backed by a single JSON object on disk.
///
/// Reads are served from memory. Every write takes an exclusive lock on a
/// sidecar `<file>.lock`, re-reads the file, applies the change and rewrites
/// it (temp file + rename), so several processes can share one file without
/// losing each other's keys. The in-memory copy only changes once the file
/// write has succeeded.
///
/// A file that does not parse is moved aside to `<file>.corrupt` and the
/// store starts empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Values>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let values = read_shared(&path)?;

        debug!(path = %path.display(), entries = values.len(), "Opened preference store");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file under the lock, applies `change` and writes the
    /// result back when `change` reports a modification.
    fn update<T>(&self, change: impl FnOnce(&mut Values) -> (T, bool)) -> StoreResult<T> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;

        let (result, next) = with_lock(&self.path, || {
            let mut next = read_or_quarantine(&self.path)?;
            let (result, modified) = change(&mut next);
            if modified {
                write_file(&self.path, &next)?;
            }
            Ok((result, next))
        })?;

        *values = next;
        Ok(result)
    }
}

/// Appends `suffix` to the file name of `path`.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("store"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Runs `f` while holding an exclusive lock on the store's lock file.
fn with_lock<T>(path: &Path, f: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(sidecar(path, ".lock"))?;

    lock.lock_exclusive()?;
    let result = f();
    FileExt::unlock(&lock)?;
    result
}

fn read_file(path: &Path) -> StoreResult<Values> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Reads without the lock. Writers replace the file by rename, so a reader
/// sees either the old or the new content; only a corrupt file needs the
/// lock to be moved aside safely.
fn read_shared(path: &Path) -> StoreResult<Values> {
    match read_file(path) {
        Err(StoreError::Serialization(_)) => with_lock(path, || read_or_quarantine(path)),
        other => other,
    }
}

/// Must be called with the lock held.
fn read_or_quarantine(path: &Path) -> StoreResult<Values> {
    match read_file(path) {
        Err(StoreError::Serialization(e)) => {
            let aside = sidecar(path, ".corrupt");
            warn!(
                path = %path.display(),
                moved_to = %aside.display(),
                error = %e,
                "Store file is corrupt, starting empty"
            );
            if let Err(e) = fs::rename(path, &aside) {
                warn!(path = %path.display(), error = %e, "Failed to move corrupt store aside");
            }
            Ok(BTreeMap::new())
        }
        other => other,
    }
}

/// Must be called with the lock held.
fn write_file(path: &Path, values: &Values) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(values)?;
    let tmp = sidecar(path, ".tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    trace!(path = %path.display(), "Store written");
    Ok(())
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        self.update(|values| {
            values.insert(key.to_string(), value);
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.update(|values| {
            let removed = values.remove(key).is_some();
            (removed, removed)
        })
    }

    fn reload(&self) -> StoreResult<()> {
        let fresh = read_shared(&self.path)?;
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        *values = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_put_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.put("a", true.into()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(StoredValue::Bool(true)));

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
    }

    #[test]
    fn string_set_helpers() {
        let store = MemoryStore::new();
        let ids: HashSet<String> = ["5", "10"].iter().map(|s| s.to_string()).collect();

        store.put_string_set("ids", &ids).unwrap();
        assert_eq!(store.get_string_set("ids").unwrap(), Some(ids));

        store.put("ids", "not a set".into()).unwrap();
        assert_eq!(store.get_string_set("ids").unwrap(), None);
    }

    #[test]
    fn json_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("prefs.json")).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.put("flag", true.into()).unwrap();
            store.put("choice", "1".into()).unwrap();
            let ids: HashSet<String> = ["42".to_string()].into_iter().collect();
            store.put_string_set("PREF_MARKINGS", &ids).unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("flag").unwrap(), Some(StoredValue::Bool(true)));
        assert_eq!(
            store.get("choice").unwrap(),
            Some(StoredValue::Text("1".to_string()))
        );
        let ids = store.get_string_set("PREF_MARKINGS").unwrap().unwrap();
        assert!(ids.contains("42"));
        assert!(!dir.path().join("nested").join("prefs.json.tmp").exists());
    }

    #[test]
    fn json_store_remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put("flag", false.into()).unwrap();
        assert!(store.remove("flag").unwrap());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("flag").unwrap(), None);
    }

    #[test]
    fn json_store_keeps_keys_written_by_others() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let daemon = JsonFileStore::open(&path).unwrap();
        let cli = JsonFileStore::open(&path).unwrap();

        cli.put("choice", "1".into()).unwrap();
        assert_eq!(daemon.get("choice").unwrap(), None);

        daemon.put("flag", true.into()).unwrap();
        assert_eq!(
            daemon.get("choice").unwrap(),
            Some(StoredValue::Text("1".to_string()))
        );

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("flag").unwrap(), Some(StoredValue::Bool(true)));
        assert!(reopened.get("choice").unwrap().is_some());
    }

    #[test]
    fn json_store_reload_picks_up_external_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = JsonFileStore::open(&path).unwrap();
        fs::write(&path, r#"{"flag":false}"#).unwrap();
        assert_eq!(store.get("flag").unwrap(), None);

        store.reload().unwrap();
        assert_eq!(store.get("flag").unwrap(), Some(StoredValue::Bool(false)));
    }

    #[test]
    fn json_store_moves_corrupt_file_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("flag").unwrap(), None);
        assert!(!path.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("prefs.json.corrupt")).unwrap(),
            "{ not json"
        );

        store.put("flag", true.into()).unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("flag").unwrap(), Some(StoredValue::Bool(true)));
    }

    #[test]
    fn json_store_write_over_corrupt_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let store = JsonFileStore::open(&path).unwrap();

        fs::write(&path, "[1, 2").unwrap();
        store.put("choice", "0".into()).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("choice").unwrap(),
            Some(StoredValue::Text("0".to_string()))
        );
        assert!(dir.path().join("prefs.json.corrupt").exists());
    }

    #[test]
    fn json_store_concurrent_writers_keep_every_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path).unwrap();

        std::thread::scope(|scope| {
            for (name, store) in [("a", &first), ("b", &second)] {
                scope.spawn(move || {
                    for i in 0..50 {
                        store.put(&format!("{name}{i}"), true.into()).unwrap();
                    }
                });
            }
        });

        let reopened = JsonFileStore::open(&path).unwrap();
        for name in ["a", "b"] {
            for i in 0..50 {
                assert_eq!(
                    reopened.get(&format!("{name}{i}")).unwrap(),
                    Some(StoredValue::Bool(true)),
                    "missing {name}{i}"
                );
            }
        }
        assert!(!dir.path().join("prefs.json.corrupt").exists());
    }

    #[test]
    fn typed_readers() {
        let store = MemoryStore::new();
        store.put("text", "1".into()).unwrap();
        store.put("int", StoredValue::Int(0)).unwrap();
        store.put("flag", true.into()).unwrap();
        store.put("flag_text", "false".into()).unwrap();

        assert_eq!(store.get_text("text").unwrap(), Some("1".to_string()));
        assert_eq!(store.get_text("int").unwrap(), Some("0".to_string()));
        assert_eq!(store.get_text("flag").unwrap(), None);
        assert_eq!(store.get_text("missing").unwrap(), None);

        assert_eq!(store.get_bool("flag").unwrap(), Some(true));
        assert_eq!(store.get_bool("flag_text").unwrap(), Some(false));
        assert_eq!(store.get_bool("text").unwrap(), None);
        assert_eq!(store.get_bool("int").unwrap(), None);
    }

    #[test]
    fn stored_value_json_shape() {
        let mut values = BTreeMap::new();
        values.insert("b".to_string(), StoredValue::Bool(true));
        values.insert("t".to_string(), StoredValue::Text("0".to_string()));
        values.insert(
            "s".to_string(),
            StoredValue::StringSet(["1".to_string()].into_iter().collect()),
        );

        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"{"b":true,"s":["1"],"t":"0"}"#);
    }
}
