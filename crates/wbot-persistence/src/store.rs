//! Durable slot storage.

use crate::error::PersistenceResult;
use crate::snapshot::{PersistedSnapshot, SnapshotPatch};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Single-slot key-value store for the persisted session subset.
///
/// `load` never fails: an absent or unreadable slot is reported as `None`
/// so startup falls back to defaults.
pub trait SessionStore: Send + Sync {
    /// Merge `patch` into the stored slot.
    fn save(&self, patch: &SnapshotPatch) -> PersistenceResult<()>;

    /// Read the slot. Absent or corrupted data yields `None`.
    fn load(&self) -> Option<PersistedSnapshot>;

    /// Remove the slot entirely.
    fn clear(&self) -> PersistenceResult<()>;
}

/// JSON file slot. Writes go to a sibling temp file and are renamed into
/// place so a crash mid-write leaves the previous blob intact.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing(&self) -> Option<PersistedSnapshot> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session slot");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupted session slot, ignoring");
                None
            }
        }
    }

    fn write_atomic(&self, snapshot: &PersistedSnapshot) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            let body = serde_json::to_vec_pretty(snapshot)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for JsonFileStore {
    fn save(&self, patch: &SnapshotPatch) -> PersistenceResult<()> {
        let _guard = self.lock.lock();
        let mut snapshot = self.read_existing().unwrap_or_default();
        patch.clone().apply_to(&mut snapshot);
        self.write_atomic(&snapshot)?;
        debug!(path = %self.path.display(), "Session slot written");
        Ok(())
    }

    fn load(&self) -> Option<PersistedSnapshot> {
        let _guard = self.lock.lock();
        self.read_existing()
    }

    fn clear(&self) -> PersistenceResult<()> {
        let _guard = self.lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slot, used when no durable path is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<PersistedSnapshot>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated slot.
    pub fn with_snapshot(snapshot: PersistedSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Number of `save` calls that reached the store.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, patch: &SnapshotPatch) -> PersistenceResult<()> {
        let mut slot = self.slot.lock();
        let snapshot = slot.get_or_insert_with(PersistedSnapshot::default);
        patch.clone().apply_to(snapshot);
        *self.saves.lock() += 1;
        Ok(())
    }

    fn load(&self) -> Option<PersistedSnapshot> {
        self.slot.lock().clone()
    }

    fn clear(&self) -> PersistenceResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
