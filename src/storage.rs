use crate::config::write_atomic;
use crate::stats::StatValueSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read or write save file: {0}")]
    Io(#[from] io::Error),

    #[error("save file is not a valid snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// The file exists but does not hold a snapshot.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Json(_))
    }
}

/// The only durable record: who the pet is, its stats, and when they were taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub pet_type: String,
    pub pet_name: String,
    #[serde(default)]
    pub pet_color: Option<String>,
    #[serde(default)]
    pub stats: StatValueSet,
    pub last_saved: DateTime<Utc>,
}

/// Persistence collaborator. Implementations absorb their own failures:
/// anything unreadable loads as `None`.
pub trait SnapshotStore {
    fn load(&mut self) -> Option<PersistedSnapshot>;
    fn save(&mut self, snapshot: &PersistedSnapshot);
    fn clear(&mut self);
}

/// One pretty-printed JSON file, replaced atomically on every save.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Option<PersistedSnapshot>, StorageError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    pub fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &data)?;
        Ok(())
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&mut self) -> Option<PersistedSnapshot> {
        match self.read() {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_corrupt() => {
                log::warn!("discarding save {}: {err}", self.path.display());
                self.clear();
                None
            }
            Err(err) => {
                log::warn!("leaving unreadable save {} in place: {err}", self.path.display());
                None
            }
        }
    }

    fn save(&mut self, snapshot: &PersistedSnapshot) {
        if let Err(err) = self.write(snapshot) {
            log::warn!("could not save pet to {}: {err}", self.path.display());
        }
    }

    fn clear(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("could not remove {}: {err}", self.path.display()),
        }
    }
}

/// Keeps the snapshot in memory only. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    snapshot: Option<PersistedSnapshot>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: PersistedSnapshot) -> Self {
        let store = Self::new();
        store.inner.borrow_mut().snapshot = Some(snapshot);
        store
    }

    pub fn snapshot(&self) -> Option<PersistedSnapshot> {
        self.inner.borrow().snapshot.clone()
    }

    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&mut self) -> Option<PersistedSnapshot> {
        self.snapshot()
    }

    fn save(&mut self, snapshot: &PersistedSnapshot) {
        let mut slot = self.inner.borrow_mut();
        slot.snapshot = Some(snapshot.clone());
        slot.writes += 1;
    }

    fn clear(&mut self) {
        self.inner.borrow_mut().snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn snapshot() -> PersistedSnapshot {
        let mut stats = StatValueSet::new();
        stats.insert("hunger".to_string(), 64.0);
        PersistedSnapshot {
            pet_type: "cat".to_string(),
            pet_name: "Miso".to_string(),
            pet_color: Some("siamese".to_string()),
            stats,
            last_saved: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("save.json"));
        assert!(store.read().unwrap().is_none());
        assert!(store.load().is_none());
        store.clear();
    }

    #[test]
    fn save_then_load_returns_the_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("save.json"));
        store.save(&snapshot());
        assert_eq!(store.load(), Some(snapshot()));
    }

    #[test]
    fn corrupt_file_is_cleared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        fs::write(&path, "{\"pet_type\": \"cat\", \"stats\": ").unwrap();
        let mut store = JsonFileStore::new(&path);
        assert!(matches!(store.read(), Err(StorageError::Json(_))));
        assert!(store.load().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn invalid_utf8_counts_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let mut store = JsonFileStore::new(&path);
        assert!(store.load().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn only_parse_failures_are_corruption() {
        let denied = StorageError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!denied.is_corrupt());
        let garbage = serde_json::from_str::<PersistedSnapshot>("nope").unwrap_err();
        assert!(StorageError::from(garbage).is_corrupt());
    }

    #[test]
    fn unreadable_save_is_left_in_place() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be: reading fails with an io error
        let path = dir.path().join("save.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(matches!(store.read(), Err(StorageError::Io(_))));
        assert!(store.load().is_none());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn color_and_stats_are_optional_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        fs::write(
            &path,
            r#"{"pet_type":"dog","pet_name":"Rex","last_saved":"2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        let loaded = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(loaded.pet_color, None);
        assert!(loaded.stats.is_empty());
    }

    #[test]
    fn memory_store_counts_writes() {
        let mut store = MemoryStore::new();
        store.save(&snapshot());
        store.save(&snapshot());
        assert_eq!(store.writes(), 2);
        store.clear();
        assert!(store.load().is_none());
    }
}
