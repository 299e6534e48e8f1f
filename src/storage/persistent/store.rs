//! `SnapshotStore` over the journal.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::snapshot::BufferSnapshot;
use crate::storage::traits::{SnapshotStore, StorageError};

use super::file_lock::FileLock;
use super::journal::{Journal, RecordKind, ReplayedState};
use super::PersistentConfig;

/// Journal file name inside the store directory.
pub const JOURNAL_FILE: &str = "snapshot.journal";

struct Inner {
    journal: Journal,
    state: ReplayedState,
}

/// Durable snapshot store backed by a locked directory.
///
/// Reads are served from memory; every write is journaled before the cached
/// state changes, so a failed write leaves both untouched.
pub struct FileSnapshotStore {
    dir: PathBuf,
    cfg: PersistentConfig,
    inner: Mutex<Inner>,
    _lock: FileLock,
}

impl std::fmt::Debug for FileSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSnapshotStore")
            .field("dir", &self.dir)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl FileSnapshotStore {
    /// Open (creating if needed) the store in `dir`.
    pub fn open(dir: &Path, cfg: PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let lock = FileLock::acquire(dir)?;

        let (journal, state) = Journal::open(&dir.join(JOURNAL_FILE), cfg.sync_on_write)?;
        tracing::debug!(
            dir = %dir.display(),
            records = state.records,
            active = state.active,
            fingerprint = %state.snapshot.fingerprint(),
            "opened snapshot store"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            cfg,
            inner: Mutex::new(Inner { journal, state }),
            _lock: lock,
        })
    }

    /// Directory holding the journal and lock file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, kind: RecordKind) -> Result<(), StorageError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StorageError::Backend("poisoned lock: journal".to_string()))?;

        inner.journal.append(kind.clone())?;
        match kind {
            RecordKind::Snapshot { content, observed_at } => {
                inner.state.snapshot = BufferSnapshot::accepted(content, observed_at);
            }
            RecordKind::Active { active } => inner.state.active = active,
        }

        if inner.journal.size_bytes()? > self.cfg.max_journal_size {
            let Inner { journal, state } = &mut *inner;
            // The record is already durable; a failed compaction only costs space.
            if let Err(e) = journal.compact(state) {
                tracing::warn!(error = %e, dir = %self.dir.display(), "snapshot journal compaction failed");
            }
        }

        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&ReplayedState) -> T) -> Result<T, StorageError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StorageError::Backend("poisoned lock: journal".to_string()))?;
        Ok(f(&inner.state))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save_snapshot(&self, content: &str, observed_at: DateTime<Utc>) -> Result<(), StorageError> {
        self.write(RecordKind::Snapshot {
            content: content.to_string(),
            observed_at,
        })
    }

    fn load_snapshot(&self) -> Result<BufferSnapshot, StorageError> {
        self.read(|state| state.snapshot.clone())
    }

    fn set_active(&self, active: bool) -> Result<(), StorageError> {
        self.write(RecordKind::Active { active })
    }

    fn get_active(&self) -> Result<bool, StorageError> {
        self.read(|state| state.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::from_millis;
    use tempfile::tempdir;

    fn cfg() -> PersistentConfig {
        PersistentConfig {
            sync_on_write: false,
            ..PersistentConfig::default()
        }
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileSnapshotStore::open(dir.path(), cfg()).unwrap();
            store.save_snapshot("A", from_millis(100)).unwrap();
            store.set_active(true).unwrap();
        }

        let store = FileSnapshotStore::open(dir.path(), cfg()).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), BufferSnapshot::accepted("A", from_millis(100)));
        assert!(store.get_active().unwrap());
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = FileSnapshotStore::open(dir.path(), cfg()).unwrap();
        let err = FileSnapshotStore::open(dir.path(), cfg()).unwrap_err();
        assert!(matches!(err, StorageError::Locked { .. }));
    }

    #[test]
    fn test_compaction_keeps_latest() {
        let dir = tempdir().unwrap();
        let small = PersistentConfig {
            max_journal_size: 1024,
            sync_on_write: false,
        };

        {
            let store = FileSnapshotStore::open(dir.path(), small.clone()).unwrap();
            let filler = "x".repeat(200);
            for i in 0..40 {
                store.save_snapshot(&format!("{filler}{i}"), from_millis(i)).unwrap();
            }
            let size = fs::metadata(dir.path().join(JOURNAL_FILE)).unwrap().len();
            assert!(size <= 1024 + 512, "journal not compacted: {size} bytes");
        }

        let store = FileSnapshotStore::open(dir.path(), small).unwrap();
        let snap = store.load_snapshot().unwrap();
        assert!(snap.content.unwrap().ends_with("39"));
        assert_eq!(snap.observed_at, from_millis(39));
    }

    #[test]
    fn test_oversized_snapshot_is_rejected_and_earlier_state_kept() {
        let dir = tempdir().unwrap();
        {
            let store = FileSnapshotStore::open(dir.path(), cfg()).unwrap();
            store.save_snapshot("small", from_millis(1)).unwrap();

            let huge = "x".repeat(super::super::codec::MAX_RECORD_SIZE);
            assert!(store.save_snapshot(&huge, from_millis(2)).is_err());
            assert_eq!(store.load_snapshot().unwrap(), BufferSnapshot::accepted("small", from_millis(1)));
        }

        let store = FileSnapshotStore::open(dir.path(), cfg()).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), BufferSnapshot::accepted("small", from_millis(1)));
    }
}
